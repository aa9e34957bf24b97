//! # Montage-Compositor
//!
//! Assemble a single video from a declarative timeline of still holds and
//! existing clips. Every entry is normalized to one resolution, frame rate
//! and pixel format, then all of them are joined without re-encoding.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use montage_compositor::{
//!     composition::CompositionEngine,
//!     config::Config,
//!     video::FfmpegEngine,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config::from_file("montage.toml")?;
//! let project = config.active_project()?.clone();
//! let ffmpeg = FfmpegEngine::new(config.settings.ffmpeg.clone());
//!
//! let engine = CompositionEngine::new(config.settings, project, ".", Box::new(ffmpeg));
//! engine.compose().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`timeline`] - Timeline model and still source resolution
//! - [`video`] - Segment rendering, the transcoder contract and the workspace
//! - [`composition`] - Pipeline orchestration and final assembly
//! - [`config`] - Configuration management
//!
//! ## Still sources
//!
//! Each still hold shows either a fixed image or a frame taken from a clip.
//! With `use_next_video_frame` a still freezes on the first frame of the clip
//! that follows it, with `use_last_video_frame` on the last frame of the clip
//! before it, and with `use_first_frame` alone every still shows the first
//! frame of the first clip.

pub mod composition;
pub mod config;
pub mod error;
pub mod timeline;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    composition::CompositionEngine,
    config::{Config, ProjectConfig},
    error::{MontageError, Result},
    timeline::{Timeline, TimelineEntry},
    video::TranscodeEngine,
};
