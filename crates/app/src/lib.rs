//! Shared command line handling for the `video-recorder` and `aja-recorder`
//! binaries.

pub mod cli;
