use video_recorder_app::cli;
use video_recorder_core::AppProfile;

fn main() -> video_recorder_core::Result<()> {
    cli::init_tracing();

    let args = cli::parse_args(AppProfile::AjaRecorder);
    cli::run(AppProfile::AjaRecorder, &args)
}
