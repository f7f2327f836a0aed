//! Translation of a composed graph into a GStreamer launch description.
//!
//! Each node maps to a short element chain. Every flow enters its
//! downstream node through a `queue` sized from that node's allocator. A
//! node feeding several consumers fans out through a `tee`; a sink that
//! also feeds another node is tapped through a `tee` in front of it.

use std::collections::HashSet;
use std::path::Path;

use crate::graph::{Allocator, Graph, Node, NodeKind};
use crate::{RecorderError, Result};

pub fn describe(graph: &Graph) -> Result<String> {
    let roots = graph.roots();
    let [root] = roots.as_slice() else {
        return Err(RecorderError::Graph(format!(
            "expected exactly one source node, found {}",
            roots.len()
        )));
    };

    let mut out = String::new();
    let mut visited = HashSet::new();
    emit(graph, *root, &mut visited, &mut out)?;
    Ok(out)
}

fn emit<'a>(
    graph: &'a Graph,
    node: &'a Node,
    visited: &mut HashSet<&'a str>,
    out: &mut String,
) -> Result<()> {
    if !visited.insert(node.name.as_str()) {
        return Err(RecorderError::Graph(format!(
            "node `{}` is reached twice",
            node.name
        )));
    }

    let consumers = graph
        .outgoing(&node.name)
        .map(|edge| {
            graph
                .node(&edge.to)
                .ok_or_else(|| RecorderError::Graph(format!("unknown node `{}`", edge.to)))
        })
        .collect::<Result<Vec<_>>>()?;
    let chain = element_chain(node);

    if node.kind.is_sink() && !consumers.is_empty() {
        let tee = format!("{}_tap", node.name);
        out.push_str(&format!("tee name={tee} {tee}. ! queue ! {chain}"));
        return fan_out(graph, &tee, &consumers, visited, out);
    }

    out.push_str(&chain);
    match consumers.as_slice() {
        [] => Ok(()),
        [consumer] => {
            out.push_str(&format!(" ! {} ! ", queue_for(consumer)));
            emit(graph, *consumer, visited, out)
        }
        _ => {
            let tee = format!("{}_tee", node.name);
            out.push_str(&format!(" ! tee name={tee}"));
            fan_out(graph, &tee, &consumers, visited, out)
        }
    }
}

fn fan_out<'a>(
    graph: &'a Graph,
    tee: &str,
    consumers: &[&'a Node],
    visited: &mut HashSet<&'a str>,
    out: &mut String,
) -> Result<()> {
    for &consumer in consumers {
        out.push_str(&format!(" {tee}. ! {} ! ", queue_for(consumer)));
        emit(graph, consumer, visited, out)?;
    }
    Ok(())
}

/// The queue in front of a node holds what that node's allocator would.
fn queue_for(node: &Node) -> String {
    match node.allocator {
        Some(Allocator::BlockMemoryPool { num_blocks, .. }) => {
            format!("queue max-size-buffers={num_blocks} max-size-bytes=0 max-size-time=0")
        }
        Some(Allocator::Unbounded) => {
            "queue max-size-buffers=0 max-size-bytes=0 max-size-time=0".to_string()
        }
        None => "queue".to_string(),
    }
}

fn element_chain(node: &Node) -> String {
    match node.kind {
        NodeKind::AjaSource => {
            let device = node.param_str("device").unwrap_or("0");
            let channel = node.param_u64("channel").unwrap_or(1).saturating_sub(1);
            format!(
                "ajasrc device-identifier={} channel={channel}",
                quote(device)
            )
        }
        NodeKind::V4l2Capture => {
            let device = node.param_str("device").unwrap_or("/dev/video0");
            let mut chain = format!("v4l2src device={}", quote(device));
            if let Some(caps) = raw_caps(None, node.param_u64("width"), node.param_u64("height"))
            {
                chain.push_str(&format!(" ! {caps}"));
            }
            chain
        }
        NodeKind::VideoReplayer => {
            let location = media_file(node);
            format!("filesrc location={} ! decodebin ! videoconvert", quote(&location))
        }
        NodeKind::FormatConverter => {
            let format = node.param_str("out_dtype").and_then(video_format);
            let width = node.param_u64("resize_width");
            let height = node.param_u64("resize_height");
            let scale = if width.is_some() || height.is_some() {
                " ! videoscale"
            } else {
                ""
            };
            match raw_caps(format, width, height) {
                Some(caps) => format!("videoconvert{scale} ! {caps}"),
                None => "videoconvert".to_string(),
            }
        }
        NodeKind::Holoviz => {
            if node.param_bool("headless").unwrap_or(false) {
                "fakesink sync=false".to_string()
            } else {
                "videoconvert ! autovideosink sync=false".to_string()
            }
        }
        NodeKind::VideoRecorder => {
            let location = media_file(node);
            format!(
                "videoconvert ! x264enc tune=zerolatency ! mp4mux ! filesink location={}",
                quote(&location)
            )
        }
    }
}

fn media_file(node: &Node) -> String {
    let directory = node.param_str("directory").unwrap_or(".");
    let basename = node.param_str("basename").unwrap_or("tensor");
    Path::new(directory)
        .join(format!("{basename}.mp4"))
        .display()
        .to_string()
}

/// GStreamer raw video format for a converter dtype.
fn video_format(dtype: &str) -> Option<&'static str> {
    match dtype {
        "rgb888" => Some("RGB"),
        "rgba8888" => Some("RGBA"),
        "yuv420" => Some("I420"),
        "nv12" => Some("NV12"),
        _ => None,
    }
}

fn raw_caps(format: Option<&str>, width: Option<u64>, height: Option<u64>) -> Option<String> {
    let mut fields = Vec::new();
    if let Some(format) = format {
        fields.push(format!("format={format}"));
    }
    if let Some(width) = width {
        fields.push(format!("width={width}"));
    }
    if let Some(height) = height {
        fields.push(format!("height={height}"));
    }
    if fields.is_empty() {
        None
    } else {
        Some(format!("video/x-raw,{}", fields.join(",")))
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AppConfig, AppProfile, Composer, RecordType};

    fn config() -> AppConfig {
        AppConfig::from_toml_str(
            r#"
            [aja]
            width = 1920
            height = 1080
            rdma = true
            channel = 2

            [v4l2]
            device = "/dev/video1"
            width = 1280
            height = 720

            [recorder]
            directory = "/data/rec"
            basename = "run"
            "#,
        )
        .unwrap()
    }

    fn describe_for(source: &str, record: Option<RecordType>) -> String {
        let graph = Composer::new(AppProfile::VideoRecorder)
            .compose(source, record, &config())
            .unwrap();
        describe(&graph).unwrap()
    }

    #[test]
    fn record_input_splits_at_the_source() {
        let pipeline = describe_for("v4l2", None);

        assert_eq!(
            pipeline,
            "v4l2src device=\"/dev/video1\" ! video/x-raw,width=1280,height=720 \
             ! tee name=v4l2_tee \
             v4l2_tee. ! queue ! videoconvert ! autovideosink sync=false \
             v4l2_tee. ! queue max-size-buffers=0 max-size-bytes=0 max-size-time=0 \
             ! videoconvert ! video/x-raw,format=RGB \
             ! queue ! videoconvert ! x264enc tune=zerolatency ! mp4mux \
             ! filesink location=\"/data/rec/run.mp4\""
        );
    }

    #[test]
    fn record_visualizer_taps_the_display() {
        let pipeline = describe_for("v4l2", Some(RecordType::Visualizer));

        assert!(pipeline.starts_with("v4l2src"));
        assert!(pipeline.contains(
            "! queue ! tee name=holoviz_tap holoviz_tap. ! queue ! videoconvert ! autovideosink"
        ));
        assert!(pipeline.contains(" holoviz_tap. ! queue max-size-buffers=0"));
        assert!(!pipeline.contains("v4l2_tee"));
    }

    #[test]
    fn capture_card_queue_is_bounded_by_block_count() {
        let pipeline = describe_for("aja", None);

        assert!(pipeline.starts_with("ajasrc device-identifier=\"0\" channel=1"));
        assert!(pipeline.contains("queue max-size-buffers=3 max-size-bytes=0 max-size-time=0"));
    }

    #[test]
    fn replayer_reads_from_recorder_directory() {
        let pipeline = describe_for("replayer", None);

        assert!(pipeline.starts_with(
            "filesrc location=\"/data/rec/surgical_video.mp4\" ! decodebin ! videoconvert"
        ));
    }

    #[test]
    fn headless_display_uses_fakesink() {
        let mut config = config();
        config.holoviz.headless = true;
        let graph = Composer::new(AppProfile::VideoRecorder)
            .compose("v4l2", None, &config)
            .unwrap();

        let pipeline = describe(&graph).unwrap();
        assert!(pipeline.contains("fakesink sync=false"));
        assert!(!pipeline.contains("autovideosink"));
    }

    #[test]
    fn resize_adds_scaler_and_caps() {
        let mut config = config();
        config.recorder_format_converter.resize_width = Some(640);
        config.recorder_format_converter.resize_height = Some(360);
        config.recorder_format_converter.out_dtype = "rgba8888".to_string();
        let graph = Composer::new(AppProfile::VideoRecorder)
            .compose("v4l2", None, &config)
            .unwrap();

        assert!(describe(&graph)
            .unwrap()
            .contains("videoconvert ! videoscale ! video/x-raw,format=RGBA,width=640,height=360"));
    }

    #[test]
    fn quotes_embedded_quotes() {
        assert_eq!(quote("a\"b"), "\"a\\\"b\"");
    }
}
