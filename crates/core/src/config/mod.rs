//! Typed per-node configuration.
//!
//! Each processing node reads its parameters from its own section of the
//! configuration file. Keys a section does not know about are kept in its
//! `extra` map and forwarded to the node untouched.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{RecorderError, Result};

/// Frame width assumed when a source does not state one.
pub const DEFAULT_FRAME_WIDTH: u32 = 1920;
/// Frame height assumed when a source does not state one.
pub const DEFAULT_FRAME_HEIGHT: u32 = 1080;

/// Directory shared by the replayer (input) and the recorder (output).
pub const DEFAULT_VIDEO_DIR: &str = "../data/video_recorder";

/// Free-form parameters forwarded to a node as-is.
pub type ExtraParams = BTreeMap<String, serde_json::Value>;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub aja: AjaConfig,
    pub v4l2: V4l2Config,
    pub replayer: ReplayerConfig,
    pub recorder_format_converter: FormatConverterConfig,
    pub recorder: RecorderConfig,
    pub holoviz: HolovizConfig,
}

impl AppConfig {
    /// Reads and validates a configuration file.
    ///
    /// Files with a `.json` extension are parsed as JSON, anything else as
    /// TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RecorderError::Config(format!("failed to read config file {path:?}: {e}"))
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let config = if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
        .map_err(|e| match e {
            RecorderError::Config(msg) => {
                RecorderError::Config(format!("failed to parse config file {path:?}: {msg}"))
            }
            other => other,
        })?;

        tracing::debug!(?path, "configuration loaded");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| RecorderError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(content).map_err(|e| RecorderError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values that are present. Parameters that only some sources
    /// require are checked when the graph is composed.
    pub fn validate(&self) -> Result<()> {
        non_empty("aja", "device", &self.aja.device)?;
        positive("aja", "width", self.aja.width)?;
        positive("aja", "height", self.aja.height)?;
        if self.aja.channel == 0 {
            return Err(RecorderError::invalid("aja", "channel", "channels start at 1"));
        }

        non_empty("v4l2", "device", &self.v4l2.device)?;
        positive("v4l2", "width", self.v4l2.width)?;
        positive("v4l2", "height", self.v4l2.height)?;

        non_empty("replayer", "basename", &self.replayer.basename)?;
        positive("replayer", "width", self.replayer.width)?;
        positive("replayer", "height", self.replayer.height)?;

        let converter = "recorder_format_converter";
        non_empty(converter, "in_dtype", &self.recorder_format_converter.in_dtype)?;
        non_empty(converter, "out_dtype", &self.recorder_format_converter.out_dtype)?;
        positive(converter, "resize_width", self.recorder_format_converter.resize_width)?;
        positive(converter, "resize_height", self.recorder_format_converter.resize_height)?;

        non_empty("recorder", "basename", &self.recorder.basename)?;
        if self.recorder.directory.as_os_str().is_empty() {
            return Err(RecorderError::invalid("recorder", "directory", "must not be empty"));
        }
        Ok(())
    }
}

fn positive(node: &str, key: &str, value: Option<u32>) -> Result<()> {
    match value {
        Some(0) => Err(RecorderError::invalid(node, key, "must be greater than zero")),
        _ => Ok(()),
    }
}

fn non_empty(node: &str, key: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(RecorderError::invalid(node, key, "must not be empty"))
    } else {
        Ok(())
    }
}

/// Capture card source. `width`, `height` and `rdma` have no defaults: a
/// capture card run cannot be composed without them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AjaConfig {
    pub device: String,
    pub channel: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rdma: Option<bool>,
    pub enable_overlay: bool,
    #[serde(flatten)]
    pub extra: ExtraParams,
}

impl Default for AjaConfig {
    fn default() -> Self {
        Self {
            device: "0".to_string(),
            channel: 1,
            width: None,
            height: None,
            rdma: None,
            enable_overlay: false,
            extra: ExtraParams::new(),
        }
    }
}

/// V4L2 capture device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct V4l2Config {
    pub device: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixel_format: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraParams,
}

impl Default for V4l2Config {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: None,
            height: None,
            pixel_format: None,
            extra: ExtraParams::new(),
        }
    }
}

/// Replays a previously recorded stream from the recorder directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayerConfig {
    pub basename: String,
    /// Zero replays at the recorded rate.
    pub frame_rate: f32,
    pub repeat: bool,
    pub realtime: bool,
    /// Zero replays every frame.
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(flatten)]
    pub extra: ExtraParams,
}

impl Default for ReplayerConfig {
    fn default() -> Self {
        Self {
            basename: "surgical_video".to_string(),
            frame_rate: 0.0,
            repeat: true,
            realtime: true,
            count: 0,
            width: None,
            height: None,
            extra: ExtraParams::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConverterConfig {
    pub in_dtype: String,
    pub out_dtype: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize_height: Option<u32>,
    #[serde(flatten)]
    pub extra: ExtraParams,
}

impl Default for FormatConverterConfig {
    fn default() -> Self {
        Self {
            in_dtype: "rgba8888".to_string(),
            out_dtype: "rgb888".to_string(),
            resize_width: None,
            resize_height: None,
            extra: ExtraParams::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub directory: PathBuf,
    pub basename: String,
    #[serde(flatten)]
    pub extra: ExtraParams,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_VIDEO_DIR),
            basename: "tensor".to_string(),
            extra: ExtraParams::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HolovizConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_title: Option<String>,
    pub fullscreen: bool,
    pub headless: bool,
    #[serde(flatten)]
    pub extra: ExtraParams,
}
