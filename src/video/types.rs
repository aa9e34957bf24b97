use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::timeline::{EntryKind, Resolution, Timeline};

/// Encoding parameters every segment of a run is normalized to
///
/// Identical formats are what make the final join a pure stream copy.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentFormat {
    pub resolution: Resolution,
    pub fps: f64,
    pub pixel_format: String,
    pub codec: String,
}

impl SegmentFormat {
    /// Number of frames a hold of `duration` seconds occupies
    pub fn frame_count(&self, duration: f64) -> u64 {
        frame_count(duration, self.fps)
    }

    /// One frame interval in seconds
    pub fn frame_interval(&self) -> f64 {
        1.0 / self.fps
    }
}

/// `round(duration × fps)`, never less than one frame
pub fn frame_count(duration: f64, fps: f64) -> u64 {
    ((duration * fps).round() as u64).max(1)
}

/// Frames one still occupies inside the still master
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpan {
    /// Position of the still in the timeline
    pub index: usize,
    pub start: u64,
    pub frames: u64,
}

impl FrameSpan {
    pub fn end(&self) -> u64 {
        self.start + self.frames
    }
}

/// Lay the stills of `timeline` back to back in whole frames at `fps`
///
/// Each still keeps `frame_count(duration, fps)` frames, the same as when it
/// is rendered on its own, and starts where the previous one ends.
pub fn frame_spans(timeline: &Timeline, fps: f64) -> Vec<FrameSpan> {
    let mut start = 0;
    timeline
        .still_offsets()
        .into_iter()
        .map(|(index, _, duration)| {
            let span = FrameSpan { index, start, frames: frame_count(duration, fps) };
            start = span.end();
            span
        })
        .collect()
}

/// How holds are produced when every still shares one source image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StillStrategy {
    /// Render one master covering all holds, then cut each hold out of it
    #[default]
    Master,
    /// Render every hold on its own
    Independent,
}

/// A rendered, concatenation-ready unit for one timeline entry
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSegment {
    /// Position of the entry in the timeline
    pub index: usize,
    pub kind: EntryKind,
    /// 1-based occurrence within its kind
    pub occurrence: usize,
    pub path: PathBuf,
    /// Hold length for stills; clips keep their own length
    pub duration: Option<f64>,
    pub format: SegmentFormat,
}

impl ResolvedSegment {
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name()?.to_str()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
