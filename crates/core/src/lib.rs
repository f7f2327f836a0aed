//! Core library for the video recorder applications.
//!
//! A run has three phases. The configuration is loaded and validated once
//! ([`config`]). A fixed capture → display / convert → record graph is then
//! composed from it for the selected source ([`compose`]). The composed
//! [`Graph`] is finally handed to an [`Executor`] that owns scheduling,
//! buffering and device access until the pipeline finishes ([`runtime`]).

pub mod compose;
pub mod config;
pub mod error;
pub mod graph;
pub mod runtime;
pub mod source;

pub use compose::{block_count, frame_block_size, AppProfile, Composer};
pub use config::{
    AjaConfig, AppConfig, FormatConverterConfig, HolovizConfig, RecorderConfig, ReplayerConfig,
    V4l2Config,
};
pub use error::{RecorderError, Result};
pub use graph::{Allocator, CudaStreamPool, Edge, Graph, MemoryStorageType, Node, NodeKind, PortPair};
pub use runtime::{default_executor, DryRunExecutor, Executor};
pub use source::{RecordType, SourceKind};
