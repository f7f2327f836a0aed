//! Builds the fixed recording graph for a selected source.
//!
//! The graph always has four nodes and three flows:
//!
//! ```text
//! source ──► holoviz
//!    └─────► recorder_format_converter ──► recorder      (record input)
//!
//! source ──► holoviz ──► recorder_format_converter ──► recorder
//!                                                  (record visualizer)
//! ```
//!
//! Every parameter is read and checked before the first node is created, so
//! a failed composition never leaves a partial graph behind.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::{DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH};
use crate::graph::{Allocator, CudaStreamPool, Graph, MemoryStorageType, Node, NodeKind};
use crate::{AppConfig, RecordType, RecorderError, Result, SourceKind};

pub const FORMAT_CONVERTER: &str = "recorder_format_converter";
pub const VISUALIZER: &str = "holoviz";
pub const RECORDER: &str = "recorder";

const CHANNELS: u64 = 4;
const BYTES_PER_CHANNEL: u64 = 4;

/// Bytes needed for one RGBA float frame.
pub fn frame_block_size(width: u32, height: u32) -> u64 {
    u64::from(width) * u64::from(height) * CHANNELS * BYTES_PER_CHANNEL
}

/// Frames kept in flight. A zero-copy RDMA path needs one block fewer.
pub fn block_count(rdma: bool) -> u32 {
    if rdma {
        3
    } else {
        4
    }
}

/// The two applications shipped from this workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppProfile {
    /// General recorder: V4L2 device, capture card or replayer input.
    VideoRecorder,
    /// Capture card only, always records the input stream.
    AjaRecorder,
}

impl AppProfile {
    pub fn name(self) -> &'static str {
        match self {
            AppProfile::VideoRecorder => "Video Recorder App",
            AppProfile::AjaRecorder => "AJA Recorder App",
        }
    }

    /// File looked up next to the executable when no config is given.
    pub fn config_file_name(self) -> &'static str {
        match self {
            AppProfile::VideoRecorder => "video_recorder.toml",
            AppProfile::AjaRecorder => "aja_recorder.toml",
        }
    }

    pub fn supported_sources(self) -> &'static [SourceKind] {
        match self {
            AppProfile::VideoRecorder => &SourceKind::ALL,
            AppProfile::AjaRecorder => &[SourceKind::Aja],
        }
    }

    pub fn default_source(self) -> SourceKind {
        match self {
            AppProfile::VideoRecorder => SourceKind::V4l2,
            AppProfile::AjaRecorder => SourceKind::Aja,
        }
    }

    pub fn supports_record_type(self, record_type: Option<RecordType>) -> bool {
        match self {
            AppProfile::VideoRecorder => true,
            AppProfile::AjaRecorder => record_type != Some(RecordType::Visualizer),
        }
    }

    /// Whether the app owns the recorder directory and creates it on start.
    pub fn creates_video_dir(self) -> bool {
        matches!(self, AppProfile::VideoRecorder)
    }
}

/// Everything the source contributes to the rest of the graph.
#[derive(Debug)]
struct SourcePlan {
    node: Node,
    output_label: &'static str,
    width: u32,
    height: u32,
    converter_pool: Allocator,
}

#[derive(Debug, Clone, Copy)]
pub struct Composer {
    profile: AppProfile,
}

impl Composer {
    pub fn new(profile: AppProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> AppProfile {
        self.profile
    }

    /// Composes the graph for a source given by its command line tag.
    pub fn compose(
        &self,
        source: &str,
        record_type: Option<RecordType>,
        config: &AppConfig,
    ) -> Result<Graph> {
        let kind: SourceKind = source.parse()?;
        self.compose_kind(kind, record_type, config)
    }

    pub fn compose_kind(
        &self,
        kind: SourceKind,
        record_type: Option<RecordType>,
        config: &AppConfig,
    ) -> Result<Graph> {
        if !self.profile.supported_sources().contains(&kind) {
            return Err(RecorderError::InvalidSource(kind.to_string()));
        }
        if !self.profile.supports_record_type(record_type) {
            return Err(RecorderError::InvalidRecordType(
                record_type.map_or("none", RecordType::as_str).to_string(),
            ));
        }

        let plan = plan_source(kind, config)?;
        let record_visualizer = record_type == Some(RecordType::Visualizer);

        let converter = Node::new(FORMAT_CONVERTER, NodeKind::FormatConverter)
            .with_params(node_params(FORMAT_CONVERTER, &config.recorder_format_converter)?)
            .with_allocator(plan.converter_pool);
        let recorder = Node::new(RECORDER, NodeKind::VideoRecorder)
            .with_params(node_params(RECORDER, &config.recorder)?);
        let visualizer = Node::new(VISUALIZER, NodeKind::Holoviz)
            .with_params(node_params(VISUALIZER, &config.holoviz)?)
            .with_param("width", plan.width)
            .with_param("height", plan.height)
            .with_param("enable_render_buffer_input", false)
            .with_param("enable_render_buffer_output", record_visualizer)
            .with_cuda_stream_pool(CudaStreamPool::default());

        let source_name = plan.node.name.clone();
        let label = plan.output_label;

        let mut graph = Graph::new(self.profile.name());
        graph.add_node(plan.node)?;
        graph.add_node(converter)?;
        graph.add_node(recorder)?;
        graph.add_node(visualizer)?;

        graph.add_flow(&source_name, VISUALIZER, &[(label, "receivers")])?;
        if record_visualizer {
            graph.add_flow(
                VISUALIZER,
                FORMAT_CONVERTER,
                &[("render_buffer_output", "source_video")],
            )?;
        } else {
            graph.add_flow(&source_name, FORMAT_CONVERTER, &[(label, "source_video")])?;
        }
        graph.add_flow(FORMAT_CONVERTER, RECORDER, &[])?;

        tracing::info!(
            app = self.profile.name(),
            source = %kind,
            record = ?record_type,
            width = plan.width,
            height = plan.height,
            nodes = graph.nodes().len(),
            flows = graph.edges().len(),
            "pipeline composed"
        );
        Ok(graph)
    }
}

fn plan_source(kind: SourceKind, config: &AppConfig) -> Result<SourcePlan> {
    let name = kind.as_str();
    match kind {
        SourceKind::Aja => {
            let aja = &config.aja;
            let width = aja.width.ok_or_else(|| RecorderError::missing(name, "width"))?;
            let height = aja
                .height
                .ok_or_else(|| RecorderError::missing(name, "height"))?;
            let rdma = aja.rdma.ok_or_else(|| RecorderError::missing(name, "rdma"))?;

            Ok(SourcePlan {
                node: Node::new(name, NodeKind::AjaSource).with_params(node_params(name, aja)?),
                output_label: kind.output_label(),
                width,
                height,
                converter_pool: Allocator::BlockMemoryPool {
                    storage_type: MemoryStorageType::Device,
                    block_size: frame_block_size(width, height),
                    num_blocks: block_count(rdma),
                },
            })
        }
        SourceKind::V4l2 => {
            let v4l2 = &config.v4l2;
            Ok(SourcePlan {
                node: Node::new(name, NodeKind::V4l2Capture)
                    .with_params(node_params(name, v4l2)?)
                    .with_allocator(Allocator::Unbounded),
                output_label: kind.output_label(),
                width: v4l2.width.unwrap_or(DEFAULT_FRAME_WIDTH),
                height: v4l2.height.unwrap_or(DEFAULT_FRAME_HEIGHT),
                converter_pool: Allocator::Unbounded,
            })
        }
        SourceKind::Replayer => {
            let replayer = &config.replayer;
            let directory = config.recorder.directory.to_string_lossy().into_owned();
            Ok(SourcePlan {
                node: Node::new(name, NodeKind::VideoReplayer)
                    .with_params(node_params(name, replayer)?)
                    .with_param("directory", directory),
                output_label: kind.output_label(),
                width: replayer.width.unwrap_or(DEFAULT_FRAME_WIDTH),
                height: replayer.height.unwrap_or(DEFAULT_FRAME_HEIGHT),
                converter_pool: Allocator::Unbounded,
            })
        }
    }
}

fn node_params<T: Serialize>(node: &str, section: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(section) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(RecorderError::Config(format!(
            "section `{node}` is not a table: {other}"
        ))),
        Err(e) => Err(RecorderError::Config(format!(
            "section `{node}` cannot be forwarded: {e}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PortPair;

    fn full_config() -> AppConfig {
        AppConfig::from_toml_str(
            r#"
            [aja]
            width = 1920
            height = 1080
            rdma = true
            "#,
        )
        .unwrap()
    }

    fn ports(graph: &Graph, from: &str, to: &str) -> Vec<PortPair> {
        graph
            .edges()
            .iter()
            .find(|edge| edge.from == from && edge.to == to)
            .map(|edge| edge.ports.clone())
            .unwrap_or_default()
    }

    #[test]
    fn every_source_yields_four_nodes_and_three_flows() {
        let composer = Composer::new(AppProfile::VideoRecorder);
        let config = full_config();

        for kind in SourceKind::ALL {
            for record in [None, Some(RecordType::Input), Some(RecordType::Visualizer)] {
                let graph = composer.compose(kind.as_str(), record, &config).unwrap();
                assert_eq!(graph.nodes().len(), 4, "{kind} / {record:?}");
                assert_eq!(graph.edges().len(), 3, "{kind} / {record:?}");
                assert_eq!(graph.roots().len(), 1);
                assert_eq!(graph.roots()[0].name, kind.as_str());
            }
        }
    }

    #[test]
    fn unknown_source_fails_before_building_anything() {
        let composer = Composer::new(AppProfile::VideoRecorder);
        let err = composer.compose("yuan", None, &full_config()).unwrap_err();

        assert!(matches!(err, RecorderError::InvalidSource(ref tag) if tag == "yuan"));
    }

    #[test]
    fn aja_profile_rejects_other_sources() {
        let composer = Composer::new(AppProfile::AjaRecorder);

        for tag in ["v4l2", "replayer"] {
            let err = composer.compose(tag, None, &full_config()).unwrap_err();
            assert!(matches!(err, RecorderError::InvalidSource(_)));
        }
        assert!(composer.compose("aja", None, &full_config()).is_ok());
    }

    #[test]
    fn aja_profile_only_records_input() {
        let composer = Composer::new(AppProfile::AjaRecorder);
        let err = composer
            .compose("aja", Some(RecordType::Visualizer), &full_config())
            .unwrap_err();

        assert!(matches!(err, RecorderError::InvalidRecordType(ref v) if v == "visualizer"));
    }

    #[test]
    fn capture_card_requires_dimensions_and_rdma() {
        let composer = Composer::new(AppProfile::VideoRecorder);
        let config = AppConfig::from_toml_str("[aja]\nwidth = 1920\nheight = 1080\n").unwrap();

        let err = composer.compose("aja", None, &config).unwrap_err();
        assert!(matches!(
            err,
            RecorderError::MissingParameter { ref node, ref key } if node == "aja" && key == "rdma"
        ));

        let err = composer
            .compose("aja", None, &AppConfig::default())
            .unwrap_err();
        assert!(matches!(err, RecorderError::MissingParameter { ref key, .. } if key == "width"));
    }

    #[test]
    fn other_sources_do_not_need_capture_card_params() {
        let composer = Composer::new(AppProfile::VideoRecorder);
        let config = AppConfig::default();

        assert!(composer.compose("v4l2", None, &config).is_ok());
        assert!(composer.compose("replayer", None, &config).is_ok());
    }

    #[test]
    fn block_pool_sizing() {
        assert_eq!(frame_block_size(1920, 1080), 1920 * 1080 * 16);
        assert_eq!(frame_block_size(3840, 2160), 132_710_400);
        assert_eq!(block_count(true), 3);
        assert_eq!(block_count(false), 4);
    }

    #[test]
    fn capture_card_converter_gets_device_block_pool() {
        let composer = Composer::new(AppProfile::AjaRecorder);
        let config =
            AppConfig::from_toml_str("[aja]\nwidth = 1280\nheight = 720\nrdma = false\n").unwrap();

        let graph = composer.compose("aja", None, &config).unwrap();
        let converter = graph.node(FORMAT_CONVERTER).unwrap();

        assert_eq!(
            converter.allocator,
            Some(Allocator::BlockMemoryPool {
                storage_type: MemoryStorageType::Device,
                block_size: 1280 * 720 * 16,
                num_blocks: 4,
            })
        );
        assert_eq!(graph.node(VISUALIZER).unwrap().param_u64("width"), Some(1280));
    }

    #[test]
    fn other_sources_use_unbounded_allocation() {
        let composer = Composer::new(AppProfile::VideoRecorder);
        let graph = composer
            .compose("v4l2", None, &AppConfig::default())
            .unwrap();

        assert_eq!(
            graph.node(FORMAT_CONVERTER).unwrap().allocator,
            Some(Allocator::Unbounded)
        );
        assert_eq!(graph.node("v4l2").unwrap().allocator, Some(Allocator::Unbounded));
    }

    #[test]
    fn replayer_defaults_to_full_hd_on_output_port() {
        let composer = Composer::new(AppProfile::VideoRecorder);
        let graph = composer
            .compose("replayer", None, &AppConfig::default())
            .unwrap();
        let visualizer = graph.node(VISUALIZER).unwrap();

        assert_eq!(visualizer.param_u64("width"), Some(1920));
        assert_eq!(visualizer.param_u64("height"), Some(1080));
        assert_eq!(
            ports(&graph, "replayer", VISUALIZER),
            vec![PortPair {
                output: "output".to_string(),
                input: "receivers".to_string()
            }]
        );
        assert_eq!(
            graph.node("replayer").unwrap().param_str("directory"),
            Some("../data/video_recorder")
        );
    }

    #[test]
    fn record_input_taps_the_source() {
        let composer = Composer::new(AppProfile::VideoRecorder);
        let graph = composer
            .compose("aja", Some(RecordType::Input), &full_config())
            .unwrap();

        assert_eq!(
            ports(&graph, "aja", FORMAT_CONVERTER),
            vec![PortPair {
                output: "video_buffer_output".to_string(),
                input: "source_video".to_string()
            }]
        );
        assert_eq!(
            graph
                .node(VISUALIZER)
                .unwrap()
                .param_bool("enable_render_buffer_output"),
            Some(false)
        );
    }

    #[test]
    fn record_visualizer_taps_the_render_buffer() {
        let composer = Composer::new(AppProfile::VideoRecorder);
        let graph = composer
            .compose("v4l2", Some(RecordType::Visualizer), &full_config())
            .unwrap();

        assert_eq!(
            ports(&graph, VISUALIZER, FORMAT_CONVERTER),
            vec![PortPair {
                output: "render_buffer_output".to_string(),
                input: "source_video".to_string()
            }]
        );
        assert!(ports(&graph, "v4l2", FORMAT_CONVERTER).is_empty());
        assert_eq!(
            graph
                .node(VISUALIZER)
                .unwrap()
                .param_bool("enable_render_buffer_output"),
            Some(true)
        );
    }

    #[test]
    fn none_record_type_matches_input() {
        let composer = Composer::new(AppProfile::VideoRecorder);
        let config = full_config();
        let none = composer.compose("v4l2", None, &config).unwrap();
        let input = composer
            .compose("v4l2", Some(RecordType::Input), &config)
            .unwrap();

        assert_eq!(none.to_json_pretty().unwrap(), input.to_json_pretty().unwrap());
    }

    #[test]
    fn visualizer_carries_stream_pool() {
        let composer = Composer::new(AppProfile::VideoRecorder);
        let graph = composer
            .compose("v4l2", None, &AppConfig::default())
            .unwrap();

        assert_eq!(
            graph.node(VISUALIZER).unwrap().cuda_stream_pool,
            Some(CudaStreamPool::default())
        );
    }
}
