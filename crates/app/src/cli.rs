use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::builder::PossibleValuesParser;
use clap::{CommandFactory, FromArgMatches, Parser};
use tracing_subscriber::EnvFilter;
use video_recorder_core::{
    default_executor, AppConfig, AppProfile, Composer, Executor, RecordType, RecorderError, Result,
};

/// Flag value meaning "not given".
pub const UNSET: &str = "none";

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Capture, display and record a video stream", long_about = None)]
pub struct Args {
    /// The video stream to record.
    #[arg(
        short,
        long = "record_type",
        alias = "record-type",
        value_parser = ["none", "input", "visualizer"],
        default_value = UNSET
    )]
    pub record_type: String,
    /// Video source. `replayer` replays a prerecorded video from the recorder
    /// directory; the other values capture from a device.
    #[arg(short, long)]
    pub source: String,
    /// Config file to use instead of the one next to the executable.
    #[arg(short, long, default_value = UNSET)]
    pub config: String,
    /// Directory recordings are written to and replayed from.
    #[arg(short, long, default_value = UNSET)]
    pub data: String,
    /// Print the composed graph as JSON and exit without running it.
    #[arg(long)]
    pub print_graph: bool,
}

/// Command definition with the source choices of `profile`.
pub fn command(profile: AppProfile) -> clap::Command {
    let sources: Vec<&'static str> = profile
        .supported_sources()
        .iter()
        .map(|kind| kind.as_str())
        .collect();

    Args::command().about(profile.name()).mut_arg("source", |arg| {
        arg.value_parser(PossibleValuesParser::new(sources))
            .required(false)
            .default_value(profile.default_source().as_str())
    })
}

pub fn try_parse_from<I, T>(profile: AppProfile, args: I) -> std::result::Result<Args, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = command(profile).try_get_matches_from(args)?;
    Args::from_arg_matches(&matches)
}

/// Parses the process arguments, exiting with usage on bad input.
pub fn parse_args(profile: AppProfile) -> Args {
    try_parse_from(profile, std::env::args_os())
        .unwrap_or_else(|e| e.format(&mut command(profile)).exit())
}

/// `none` selects the profile's default file inside `app_dir`; any other
/// value is used as given.
pub fn resolve_config_path(value: &str, app_dir: &Path, profile: AppProfile) -> PathBuf {
    if value == UNSET {
        app_dir.join(profile.config_file_name())
    } else {
        PathBuf::from(value)
    }
}

/// Directory holding the running executable.
pub fn application_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| RecorderError::Config(format!("executable {exe:?} has no parent")))
}

pub fn run(profile: AppProfile, args: &Args) -> Result<()> {
    let record_type = RecordType::normalize(&args.record_type)?;
    let config_path = resolve_config_path(&args.config, &application_dir()?, profile);
    tracing::info!(
        app = profile.name(),
        source = %args.source,
        record = ?record_type,
        config = ?config_path,
        "starting"
    );

    let mut config = AppConfig::load(&config_path)?;
    if args.data != UNSET {
        config.recorder.directory = PathBuf::from(&args.data);
    }
    if profile.creates_video_dir() {
        std::fs::create_dir_all(&config.recorder.directory)?;
        tracing::debug!(directory = ?config.recorder.directory, "video directory ready");
    }

    let graph = Composer::new(profile).compose(&args.source, record_type, &config)?;
    if args.print_graph {
        println!("{}", graph.to_json_pretty()?);
        return Ok(());
    }

    default_executor().run(&graph)?;
    tracing::info!(app = profile.name(), "pipeline finished");
    Ok(())
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}
