use gstreamer as gst;
use gstreamer::prelude::*;
use tracing::{debug, info, warn};

use super::{launch, Executor};
use crate::{Graph, RecorderError, Result};

/// Runs the graph as a GStreamer pipeline until end-of-stream or error.
///
/// Ctrl+C sends end-of-stream instead of tearing the pipeline down, so the
/// recorder can finalise its container before the run returns.
#[derive(Debug, Default)]
pub struct GstExecutor {
    interrupt_installed: bool,
}

impl Executor for GstExecutor {
    fn run(&mut self, graph: &Graph) -> Result<()> {
        let description = launch::describe(graph)?;
        info!(app = graph.name(), pipeline = %description, "launching pipeline");

        gst::init()
            .map_err(|e| RecorderError::Runtime(format!("failed to initialize GStreamer: {e}")))?;

        let pipeline = gst::parse::launch(&description)
            .map_err(|e| RecorderError::Runtime(format!("failed to build pipeline: {e}")))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| RecorderError::Runtime("launch description is not a pipeline".into()))?;
        let bus = pipeline
            .bus()
            .ok_or_else(|| RecorderError::Runtime("pipeline has no bus".into()))?;

        if !self.interrupt_installed {
            let eos_target = pipeline.clone();
            ctrlc::set_handler(move || {
                info!("interrupt received, sending end-of-stream");
                if !eos_target.send_event(gst::event::Eos::new()) {
                    warn!("pipeline did not accept end-of-stream");
                }
            })
            .map_err(|e| RecorderError::Runtime(format!("failed to install Ctrl+C handler: {e}")))?;
            self.interrupt_installed = true;
        }

        let outcome = match pipeline.set_state(gst::State::Playing) {
            Ok(_) => wait_for_completion(&bus),
            Err(e) => Err(RecorderError::Runtime(format!(
                "failed to start pipeline: {e:?}"
            ))),
        };

        if let Err(e) = pipeline.set_state(gst::State::Null) {
            warn!(?e, "failed to stop pipeline");
        }
        outcome
    }
}

fn wait_for_completion(bus: &gst::Bus) -> Result<()> {
    use gst::MessageView;

    for msg in bus.iter_timed(gst::ClockTime::NONE) {
        match msg.view() {
            MessageView::Eos(_) => {
                info!("end of stream");
                return Ok(());
            }
            MessageView::Error(err) => {
                let source = err
                    .src()
                    .map(|s| s.path_string().to_string())
                    .unwrap_or_default();
                return Err(RecorderError::Runtime(format!(
                    "{source}: {} ({:?})",
                    err.error(),
                    err.debug()
                )));
            }
            MessageView::Warning(w) => {
                warn!(source = ?w.src().map(|s| s.path_string()), warning = %w.error(), "pipeline warning");
            }
            MessageView::StateChanged(s) => {
                debug!(
                    element = ?s.src().map(|src| src.name()),
                    old = ?s.old(),
                    new = ?s.current(),
                    "state changed"
                );
            }
            _ => {}
        }
    }
    Ok(())
}
