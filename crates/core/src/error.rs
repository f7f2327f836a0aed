/// Result alias that carries the custom [`RecorderError`] type.
pub type Result<T> = std::result::Result<T, RecorderError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    /// The source tag is not one of the known kinds, or the selected
    /// application does not support it.
    #[error("invalid source `{0}`")]
    InvalidSource(String),
    /// A parameter the selected node cannot be built without.
    #[error("missing parameter `{key}` for node `{node}`")]
    MissingParameter { node: String, key: String },
    #[error("invalid parameter `{key}` for node `{node}`: {reason}")]
    InvalidParameter {
        node: String,
        key: String,
        reason: String,
    },
    #[error("invalid record type `{0}`")]
    InvalidRecordType(String),
    /// Bad edge or duplicate node while assembling a graph.
    #[error("graph: {0}")]
    Graph(String),
    #[error("config: {0}")]
    Config(String),
    #[error("runtime: {0}")]
    Runtime(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl RecorderError {
    pub fn missing(node: impl Into<String>, key: impl Into<String>) -> Self {
        Self::MissingParameter {
            node: node.into(),
            key: key.into(),
        }
    }

    pub fn invalid(
        node: impl Into<String>,
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            node: node.into(),
            key: key.into(),
            reason: reason.into(),
        }
    }
}
