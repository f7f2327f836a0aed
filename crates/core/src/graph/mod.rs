//! Directed graph of processing nodes joined at named ports.

mod resource;

pub use resource::{Allocator, CudaStreamPool, MemoryStorageType};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{RecorderError, Result};

/// Concrete processing node types the pipeline is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    AjaSource,
    V4l2Capture,
    VideoReplayer,
    FormatConverter,
    Holoviz,
    VideoRecorder,
}

impl NodeKind {
    pub fn input_ports(self) -> &'static [&'static str] {
        match self {
            NodeKind::AjaSource => &["overlay_buffer_input"],
            NodeKind::V4l2Capture | NodeKind::VideoReplayer => &[],
            NodeKind::FormatConverter => &["source_video"],
            NodeKind::Holoviz => &["receivers", "input_specs"],
            NodeKind::VideoRecorder => &["input"],
        }
    }

    pub fn output_ports(self) -> &'static [&'static str] {
        match self {
            NodeKind::AjaSource => &["video_buffer_output", "overlay_buffer_output"],
            NodeKind::V4l2Capture => &["signal"],
            NodeKind::VideoReplayer => &["output"],
            NodeKind::FormatConverter => &["tensor"],
            NodeKind::Holoviz => &["render_buffer_output"],
            NodeKind::VideoRecorder => &[],
        }
    }

    /// Nodes that terminate a stream (display or file).
    pub fn is_sink(self) -> bool {
        matches!(self, NodeKind::Holoviz | NodeKind::VideoRecorder)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub params: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocator: Option<Allocator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cuda_stream_pool: Option<CudaStreamPool>,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            params: Map::new(),
            allocator: None,
            cuda_stream_pool: None,
        }
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_allocator(mut self, allocator: Allocator) -> Self {
        self.allocator = Some(allocator);
        self
    }

    pub fn with_cuda_stream_pool(mut self, pool: CudaStreamPool) -> Self {
        self.cuda_stream_pool = Some(pool);
        self
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    pub fn param_u64(&self, key: &str) -> Option<u64> {
        self.params.get(key).and_then(Value::as_u64)
    }

    pub fn param_bool(&self, key: &str) -> Option<bool> {
        self.params.get(key).and_then(Value::as_bool)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortPair {
    pub output: String,
    pub input: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub ports: Vec<PortPair>,
}

/// Nodes plus the flows between them. Nodes are kept in insertion order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Graph {
    name: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.name == name)
    }

    pub fn add_node(&mut self, node: Node) -> Result<()> {
        if self.node(&node.name).is_some() {
            return Err(RecorderError::Graph(format!(
                "duplicate node `{}`",
                node.name
            )));
        }
        tracing::debug!(node = %node.name, kind = ?node.kind, "node added");
        self.nodes.push(node);
        Ok(())
    }

    /// Connects `from` to `to`. With no explicit port pairs both nodes must
    /// expose exactly one port on the connecting side.
    pub fn add_flow(&mut self, from: &str, to: &str, ports: &[(&str, &str)]) -> Result<()> {
        let source = self
            .node(from)
            .ok_or_else(|| RecorderError::Graph(format!("unknown node `{from}`")))?;
        let target = self
            .node(to)
            .ok_or_else(|| RecorderError::Graph(format!("unknown node `{to}`")))?;

        let pairs = if ports.is_empty() {
            match (source.kind.output_ports(), target.kind.input_ports()) {
                ([output], [input]) => vec![PortPair {
                    output: output.to_string(),
                    input: input.to_string(),
                }],
                _ => {
                    return Err(RecorderError::Graph(format!(
                        "flow `{from}` -> `{to}` needs explicit ports"
                    )))
                }
            }
        } else {
            let mut pairs = Vec::with_capacity(ports.len());
            for &(output, input) in ports {
                if !source.kind.output_ports().contains(&output) {
                    return Err(RecorderError::Graph(format!(
                        "node `{from}` has no output port `{output}`"
                    )));
                }
                if !target.kind.input_ports().contains(&input) {
                    return Err(RecorderError::Graph(format!(
                        "node `{to}` has no input port `{input}`"
                    )));
                }
                pairs.push(PortPair {
                    output: output.to_string(),
                    input: input.to_string(),
                });
            }
            pairs
        };

        tracing::debug!(from, to, ?pairs, "flow added");
        self.edges.push(Edge {
            from: from.to_string(),
            to: to.to_string(),
            ports: pairs,
        });
        Ok(())
    }

    pub fn outgoing<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |edge| edge.from == name)
    }

    pub fn incoming<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |edge| edge.to == name)
    }

    /// Nodes nothing flows into.
    pub fn roots(&self) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|node| self.incoming(&node.name).next().is_none())
            .collect()
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| RecorderError::Graph(format!("failed to serialize graph: {e}")))
    }
}
