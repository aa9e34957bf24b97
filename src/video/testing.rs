//! Recording transcoder used by the unit tests. It writes small real files so
//! workspace handling, size checks and manifest ordering run for real.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::RgbImage;

use crate::error::{EngineError, Result};
use crate::timeline::{FrameEdge, Resolution};
use crate::video::engine::TranscodeEngine;
use crate::video::types::SegmentFormat;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Extract { source: PathBuf, edge: FrameEdge, output: String },
    RenderStill { image: PathBuf, frames: u64, output: String },
    Slice { start: u64, frames: u64, output: String },
    Clip { source: PathBuf, output: String },
    Concat { output: String },
}

/// Clones share one call log, so a test can keep a handle while the
/// pipeline owns a boxed copy
#[derive(Default, Clone)]
pub struct RecordingEngine {
    calls: Arc<Mutex<Vec<Call>>>,
    fail_step: Option<&'static str>,
    frame_size: Option<Resolution>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call of the named step (`extract`, `still`, `slice`, `clip`, `concat`)
    pub fn failing(step: &'static str) -> Self {
        Self { fail_step: Some(step), ..Self::default() }
    }

    /// Write extracted frames at this size instead of the requested one
    pub fn with_frame_size(mut self, size: Resolution) -> Self {
        self.frame_size = Some(size);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, step: &str, call: Call, output: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail_step == Some(step) {
            if step == "concat" {
                return Err(EngineError::ConcatenationFailed { reason: "exit status 1".into() }.into());
            }
            return Err(EngineError::RenderFailed {
                step: step.to_string(),
                target: output.to_path_buf(),
                reason: "exit status 1".into(),
            }
            .into());
        }
        Ok(())
    }

    fn write_segment(output: &Path) -> Result<()> {
        fs::write(output, format!("{}\n", file_name(output)))?;
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().to_string()
}

#[async_trait]
impl TranscodeEngine for RecordingEngine {
    fn name(&self) -> &str {
        "recording"
    }

    fn preflight(&self) -> Result<()> {
        Ok(())
    }

    async fn extract_frame(
        &self,
        source: &Path,
        edge: FrameEdge,
        format: &SegmentFormat,
        output: &Path,
    ) -> Result<()> {
        let call = Call::Extract { source: source.to_path_buf(), edge, output: file_name(output) };
        self.record("extract", call, output)?;

        let size = self.frame_size.unwrap_or(format.resolution);
        RgbImage::new(size.width, size.height)
            .save(output)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        Ok(())
    }

    async fn render_still(
        &self,
        image: &Path,
        frames: u64,
        _format: &SegmentFormat,
        output: &Path,
    ) -> Result<()> {
        let call = Call::RenderStill { image: image.to_path_buf(), frames, output: file_name(output) };
        self.record("still", call, output)?;
        Self::write_segment(output)
    }

    async fn slice_still(
        &self,
        _master: &Path,
        start: u64,
        frames: u64,
        _format: &SegmentFormat,
        output: &Path,
    ) -> Result<()> {
        let call = Call::Slice { start, frames, output: file_name(output) };
        self.record("slice", call, output)?;
        Self::write_segment(output)
    }

    async fn render_clip(&self, source: &Path, _format: &SegmentFormat, output: &Path) -> Result<()> {
        let call = Call::Clip { source: source.to_path_buf(), output: file_name(output) };
        self.record("clip", call, output)?;
        Self::write_segment(output)
    }

    /// Joins segment files byte-wise in manifest order
    async fn concatenate(&self, manifest: &Path, output: &Path) -> Result<()> {
        self.record("concat", Call::Concat { output: file_name(output) }, output)?;

        let dir = manifest.parent().unwrap();
        let mut joined = Vec::new();
        for line in fs::read_to_string(manifest)?.lines() {
            let name = line
                .strip_prefix("file '")
                .and_then(|rest| rest.strip_suffix('\''))
                .unwrap()
                .replace("'\\''", "'");
            joined.extend(fs::read(dir.join(name))?);
        }
        fs::write(output, joined)?;
        Ok(())
    }
}

/// Minimal media fixtures: a real JPEG image and non-empty clip files
pub fn write_image(path: &Path, width: u32, height: u32) {
    RgbImage::new(width, height).save(path).unwrap();
}

pub fn write_clip(path: &Path) {
    fs::write(path, b"not really a video").unwrap();
}
