use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::RecorderError;

/// Closed set of video sources a pipeline can start from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// AJA capture card.
    Aja,
    /// Local V4L2 capture device.
    V4l2,
    /// Replays a previously recorded stream.
    Replayer,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::V4l2, SourceKind::Aja, SourceKind::Replayer];

    /// Tag used on the command line and as the source node name.
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Aja => "aja",
            SourceKind::V4l2 => "v4l2",
            SourceKind::Replayer => "replayer",
        }
    }

    /// Name of the output port downstream nodes connect to.
    pub fn output_label(self) -> &'static str {
        match self {
            SourceKind::Aja => "video_buffer_output",
            SourceKind::V4l2 => "signal",
            SourceKind::Replayer => "output",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = RecorderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aja" => Ok(SourceKind::Aja),
            "v4l2" => Ok(SourceKind::V4l2),
            "replayer" => Ok(SourceKind::Replayer),
            _ => Err(RecorderError::InvalidSource(s.to_string())),
        }
    }
}

/// Which stream ends up in the recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    /// The frames as they leave the source.
    Input,
    /// The rendered visualizer output.
    Visualizer,
}

impl RecordType {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::Input => "input",
            RecordType::Visualizer => "visualizer",
        }
    }

    /// Parses a command line value, mapping `none` to `None`.
    pub fn normalize(value: &str) -> crate::Result<Option<Self>> {
        if value.eq_ignore_ascii_case("none") {
            Ok(None)
        } else {
            value.parse().map(Some)
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = RecorderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "input" => Ok(RecordType::Input),
            "visualizer" => Ok(RecordType::Visualizer),
            _ => Err(RecorderError::InvalidRecordType(s.to_string())),
        }
    }
}
