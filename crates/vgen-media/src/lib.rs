//! FFmpeg CLI wrapper.
//!
//! This crate provides:
//! - A command builder and runner for FFmpeg with timeout and stderr capture
//! - Media probing via FFprobe
//! - The `Muxer` capability that lays a voice track over a generated clip

pub mod command;
pub mod error;
pub mod mux;
pub mod probe;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use mux::{FfmpegMuxer, Muxer};
pub use probe::{probe_duration, probe_media, MediaInfo};
