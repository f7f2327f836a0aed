//! Execution backends for a composed [`Graph`].
//!
//! Composition only describes the pipeline. An [`Executor`] owns everything
//! after that: buffer allocation, scheduling and device access.

pub mod launch;

#[cfg(feature = "gstreamer")]
mod gst;

#[cfg(feature = "gstreamer")]
pub use gst::GstExecutor;

use crate::{Graph, Result};

/// Runs a composed graph, blocking until the pipeline shuts down.
pub trait Executor {
    fn run(&mut self, graph: &Graph) -> Result<()>;
}

/// Logs the pipeline it would run and returns immediately.
#[derive(Debug, Default)]
pub struct DryRunExecutor;

impl Executor for DryRunExecutor {
    fn run(&mut self, graph: &Graph) -> Result<()> {
        let description = launch::describe(graph)?;
        for edge in graph.edges() {
            tracing::info!(from = %edge.from, to = %edge.to, ports = ?edge.ports, "flow");
        }
        tracing::warn!(
            pipeline = %description,
            "built without a media backend; graph composed but not executed"
        );
        Ok(())
    }
}

/// Executor for this build: GStreamer when the `gstreamer` feature is on,
/// otherwise a dry run.
pub fn default_executor() -> Box<dyn Executor> {
    #[cfg(feature = "gstreamer")]
    {
        Box::new(GstExecutor::default())
    }
    #[cfg(not(feature = "gstreamer"))]
    {
        Box::new(DryRunExecutor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AppConfig, AppProfile, Composer};

    #[test]
    fn dry_run_accepts_composed_graphs() {
        let graph = Composer::new(AppProfile::VideoRecorder)
            .compose("replayer", None, &AppConfig::default())
            .unwrap();

        assert!(DryRunExecutor.run(&graph).is_ok());
    }

    #[test]
    fn dry_run_rejects_graphs_without_a_single_source() {
        assert!(DryRunExecutor.run(&Graph::new("empty")).is_err());
    }
}
