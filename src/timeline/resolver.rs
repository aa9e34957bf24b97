use std::path::PathBuf;

use crate::error::SourceError;
use crate::timeline::model::{PolicyMode, Timeline, TimelineEntry};

/// Which frame of a clip backs a still
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameEdge {
    First,
    /// Sampled [`LAST_FRAME_OFFSET_SECS`] before end of stream
    Last,
}

/// Distance from end of stream used when sampling a clip's last frame.
/// Seeking to the exact end makes decoders return nothing.
pub const LAST_FRAME_OFFSET_SECS: f64 = 0.1;

/// Concrete image source for one still
#[derive(Debug, Clone, PartialEq)]
pub enum StillSource {
    ClipFrame { clip: PathBuf, edge: FrameEdge },
    Image(PathBuf),
}

/// Resolver answer for a still
#[derive(Debug, Clone, PartialEq)]
pub struct StillResolution {
    pub source: StillSource,
    /// Set when the policy's preferred neighbour did not exist
    pub fallback: bool,
}

/// Decides the image behind every still of a timeline
///
/// Pure with respect to the timeline: it only reads entries and the policy.
/// Frame extraction is left to the renderer.
pub struct FrameSourceResolver<'a> {
    timeline: &'a Timeline,
}

impl<'a> FrameSourceResolver<'a> {
    pub fn new(timeline: &'a Timeline) -> Self {
        Self { timeline }
    }

    pub fn mode(&self) -> PolicyMode {
        self.timeline.policy().mode()
    }

    /// Resolve the still at `index`. Returns `Ok(None)` for clip entries.
    pub fn resolve(&self, index: usize) -> Result<Option<StillResolution>, SourceError> {
        match self.timeline.entry(index) {
            Some(TimelineEntry::Still { .. }) => {}
            _ => return Ok(None),
        }

        let mode = self.mode();
        if mode.requires_clip() && self.timeline.clip_count() == 0 {
            return Err(SourceError::NoClipFound {
                still: index,
                policy: mode.to_string(),
            });
        }

        let resolution = match mode {
            PolicyMode::NextClipFrame => match self.timeline.next_clip_after(index) {
                Some((_, clip)) => Self::preferred(clip.to_path_buf(), FrameEdge::First),
                None => self.fallback(index)?,
            },
            PolicyMode::LastPreviousClipFrame => match self.timeline.previous_clip_before(index) {
                Some((_, clip)) => Self::preferred(clip.to_path_buf(), FrameEdge::Last),
                None => self.fallback(index)?,
            },
            PolicyMode::FirstClipFrame | PolicyMode::StaticImage => StillResolution {
                source: self.shared_source(index)?,
                fallback: false,
            },
        };

        Ok(Some(resolution))
    }

    /// Resolve every entry in order; `None` marks clips
    pub fn resolve_all(&self) -> Result<Vec<Option<StillResolution>>, SourceError> {
        (0..self.timeline.len()).map(|index| self.resolve(index)).collect()
    }

    /// The one source all stills share, for modes that have one
    pub fn shared(&self) -> Result<Option<StillSource>, SourceError> {
        let mode = self.mode();
        if !mode.is_shared_source() {
            return Ok(None);
        }

        let first_still = self
            .timeline
            .entries()
            .iter()
            .position(|entry| matches!(entry, TimelineEntry::Still { .. }));

        match first_still {
            Some(index) => self.shared_source(index).map(Some),
            None => Ok(None),
        }
    }

    fn preferred(clip: PathBuf, edge: FrameEdge) -> StillResolution {
        StillResolution {
            source: StillSource::ClipFrame { clip, edge },
            fallback: false,
        }
    }

    fn fallback(&self, index: usize) -> Result<StillResolution, SourceError> {
        let source = if self.timeline.policy().use_first_clip_frame {
            self.first_clip_frame(index)?
        } else {
            StillSource::Image(self.timeline.policy().static_image.clone())
        };

        Ok(StillResolution { source, fallback: true })
    }

    fn shared_source(&self, index: usize) -> Result<StillSource, SourceError> {
        match self.mode() {
            PolicyMode::StaticImage => Ok(StillSource::Image(self.timeline.policy().static_image.clone())),
            _ => self.first_clip_frame(index),
        }
    }

    fn first_clip_frame(&self, index: usize) -> Result<StillSource, SourceError> {
        let (_, clip) = self.timeline.first_clip().ok_or_else(|| SourceError::NoClipFound {
            still: index,
            policy: self.mode().to_string(),
        })?;

        Ok(StillSource::ClipFrame {
            clip: clip.to_path_buf(),
            edge: FrameEdge::First,
        })
    }
}
