use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TimelineError;

/// Target frame size shared by every segment of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `W:H`, the size syntax ffmpeg's scale and crop filters take
    pub fn as_filter_size(&self) -> String {
        format!("{}:{}", self.width, self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One instruction of the timeline
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineEntry {
    /// Hold a single image for `duration` seconds
    Still { duration: f64 },
    /// Insert an existing video at full length
    Clip { source: PathBuf },
}

impl TimelineEntry {
    pub fn still(duration: f64) -> Self {
        Self::Still { duration }
    }

    pub fn clip<P: Into<PathBuf>>(source: P) -> Self {
        Self::Clip { source: source.into() }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Still { .. } => EntryKind::Still,
            Self::Clip { .. } => EntryKind::Clip,
        }
    }

    pub fn clip_source(&self) -> Option<&Path> {
        match self {
            Self::Clip { source } => Some(source),
            Self::Still { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Still,
    Clip,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Still => "still",
            Self::Clip => "clip",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which rule picks the image behind each still, after priority is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyMode {
    NextClipFrame,
    LastPreviousClipFrame,
    FirstClipFrame,
    StaticImage,
}

impl PolicyMode {
    /// Every mode except `StaticImage` needs at least one clip in the timeline
    pub fn requires_clip(&self) -> bool {
        !matches!(self, Self::StaticImage)
    }

    /// Modes where all stills share one source image
    pub fn is_shared_source(&self) -> bool {
        matches!(self, Self::FirstClipFrame | Self::StaticImage)
    }
}

impl fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NextClipFrame => "next-clip-frame",
            Self::LastPreviousClipFrame => "last-previous-clip-frame",
            Self::FirstClipFrame => "first-clip-frame",
            Self::StaticImage => "static-image",
        };
        f.write_str(name)
    }
}

/// Still sourcing flags plus the fixed image used when no clip frame applies
///
/// The flags are independent; [`SourcePolicy::mode`] applies the priority
/// `next > last-previous > first > static`. `use_first_clip_frame` also
/// selects the fallback for stills that have no clip on the required side.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePolicy {
    pub static_image: PathBuf,
    pub use_next_clip_frame: bool,
    pub use_last_previous_clip_frame: bool,
    pub use_first_clip_frame: bool,
}

impl SourcePolicy {
    /// Policy where every still shows `image`
    pub fn static_image<P: Into<PathBuf>>(image: P) -> Self {
        Self {
            static_image: image.into(),
            use_next_clip_frame: false,
            use_last_previous_clip_frame: false,
            use_first_clip_frame: false,
        }
    }

    pub fn with_next_clip_frame(mut self, enabled: bool) -> Self {
        self.use_next_clip_frame = enabled;
        self
    }

    pub fn with_last_previous_clip_frame(mut self, enabled: bool) -> Self {
        self.use_last_previous_clip_frame = enabled;
        self
    }

    pub fn with_first_clip_frame(mut self, enabled: bool) -> Self {
        self.use_first_clip_frame = enabled;
        self
    }

    pub fn mode(&self) -> PolicyMode {
        if self.use_next_clip_frame {
            PolicyMode::NextClipFrame
        } else if self.use_last_previous_clip_frame {
            PolicyMode::LastPreviousClipFrame
        } else if self.use_first_clip_frame {
            PolicyMode::FirstClipFrame
        } else {
            PolicyMode::StaticImage
        }
    }
}

/// Ordered, validated list of timeline entries with the run's output format
///
/// Entries are read-only once built. All bookkeeping that depends on entry
/// order (occurrence numbers, master offsets, neighbouring clips) is derived
/// from the entry list on demand.
#[derive(Debug, Clone)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
    resolution: Resolution,
    frame_rate: f64,
    policy: SourcePolicy,
}

impl Timeline {
    pub fn new(
        entries: Vec<TimelineEntry>,
        resolution: Resolution,
        frame_rate: f64,
        policy: SourcePolicy,
    ) -> Result<Self, TimelineError> {
        if entries.is_empty() {
            return Err(TimelineError::Empty);
        }

        if resolution.width == 0 || resolution.height == 0 {
            return Err(TimelineError::InvalidResolution {
                width: resolution.width,
                height: resolution.height,
            });
        }

        if !frame_rate.is_finite() || frame_rate <= 0.0 {
            return Err(TimelineError::InvalidFrameRate { fps: frame_rate });
        }

        for (index, entry) in entries.iter().enumerate() {
            if let TimelineEntry::Still { duration } = entry {
                if !duration.is_finite() || *duration <= 0.0 {
                    return Err(TimelineError::InvalidDuration { index, seconds: *duration });
                }
            }
        }

        Ok(Self { entries, resolution, frame_rate, policy })
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&TimelineEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: construction rejects a timeline without entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    pub fn policy(&self) -> &SourcePolicy {
        &self.policy
    }

    /// 1-based position of the entry among entries of the same kind
    pub fn occurrence(&self, index: usize) -> Option<usize> {
        let kind = self.entries.get(index)?.kind();
        Some(
            self.entries[..=index]
                .iter()
                .filter(|entry| entry.kind() == kind)
                .count(),
        )
    }

    /// Deterministic workspace stem for an entry, e.g. `clip_2`
    pub fn segment_name(&self, index: usize) -> Option<String> {
        let kind = self.entries.get(index)?.kind();
        let occurrence = self.occurrence(index)?;
        Some(format!("{}_{}", kind, occurrence))
    }

    pub fn clip_count(&self) -> usize {
        self.entries.iter().filter(|e| e.kind() == EntryKind::Clip).count()
    }

    pub fn total_still_duration(&self) -> f64 {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                TimelineEntry::Still { duration } => Some(*duration),
                TimelineEntry::Clip { .. } => None,
            })
            .sum()
    }

    /// Offset of each still into a master covering all stills back to back,
    /// as `(entry index, offset, duration)` in entry order
    pub fn still_offsets(&self) -> Vec<(usize, f64, f64)> {
        let mut offset = 0.0;
        let mut offsets = Vec::new();

        for (index, entry) in self.entries.iter().enumerate() {
            if let TimelineEntry::Still { duration } = entry {
                offsets.push((index, offset, *duration));
                offset += duration;
            }
        }

        offsets
    }

    pub fn first_clip(&self) -> Option<(usize, &Path)> {
        self.entries
            .iter()
            .enumerate()
            .find_map(|(i, entry)| entry.clip_source().map(|source| (i, source)))
    }

    /// Nearest clip strictly after `index`
    pub fn next_clip_after(&self, index: usize) -> Option<(usize, &Path)> {
        self.entries
            .iter()
            .enumerate()
            .skip(index + 1)
            .find_map(|(i, entry)| entry.clip_source().map(|source| (i, source)))
    }

    /// Nearest clip strictly before `index`
    pub fn previous_clip_before(&self, index: usize) -> Option<(usize, &Path)> {
        let end = index.min(self.entries.len());
        self.entries[..end]
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, entry)| entry.clip_source().map(|source| (i, source)))
    }
}
