//! # Timeline
//!
//! The declarative description of a montage and the rules that pick the
//! image behind each still hold.
//!
//! ```rust
//! use montage_compositor::timeline::{
//!     FrameSourceResolver, Resolution, SourcePolicy, Timeline, TimelineEntry,
//! };
//!
//! let timeline = Timeline::new(
//!     vec![
//!         TimelineEntry::still(5.0),
//!         TimelineEntry::clip("wave.mp4"),
//!         TimelineEntry::still(3.0),
//!     ],
//!     Resolution::new(1024, 854),
//!     30.0,
//!     SourcePolicy::static_image("family.jpg").with_next_clip_frame(true),
//! )
//! .unwrap();
//!
//! let resolver = FrameSourceResolver::new(&timeline);
//! let first = resolver.resolve(0).unwrap().unwrap();
//! assert!(!first.fallback);
//! ```

pub mod model;
pub mod resolver;

pub use model::{EntryKind, PolicyMode, Resolution, SourcePolicy, Timeline, TimelineEntry};
pub use resolver::{FrameEdge, FrameSourceResolver, StillResolution, StillSource, LAST_FRAME_OFFSET_SECS};
