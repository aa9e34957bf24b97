//! # Video Processing Module
//!
//! Segment rendering on top of an external transcoding engine, and the
//! scratch workspace the renders live in.

pub mod engine;
pub mod ffmpeg;
pub mod renderer;
pub mod types;
pub mod workspace;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::TranscodeEngine;
pub use ffmpeg::{FfmpegCommand, FfmpegEngine};
pub use renderer::SegmentRenderer;
pub use types::{frame_count, frame_spans, FrameSpan, ResolvedSegment, SegmentFormat, StillStrategy};
pub use workspace::Workspace;
