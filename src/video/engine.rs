use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::timeline::FrameEdge;
use crate::video::types::SegmentFormat;

/// Contract for the external media transcoder
///
/// Every call blocks the pipeline until the underlying job has finished and
/// either produced `output` or failed. Implementations must normalize all
/// renders to `format` so segments can be joined without re-encoding.
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    /// Returns the name of this engine, used in logs
    fn name(&self) -> &str;

    /// Check that the engine can run at all, before any work starts
    fn preflight(&self) -> Result<()>;

    /// Write one still image taken at `edge` of `source`, cover-scaled and
    /// centre-cropped to exactly `format.resolution`
    async fn extract_frame(
        &self,
        source: &Path,
        edge: FrameEdge,
        format: &SegmentFormat,
        output: &Path,
    ) -> Result<()>;

    /// Loop `image` for exactly `frames` frames at `format.fps`
    async fn render_still(
        &self,
        image: &Path,
        frames: u64,
        format: &SegmentFormat,
        output: &Path,
    ) -> Result<()>;

    /// Copy frames `[start, start + frames)` of a still master into their own
    /// segment
    async fn slice_still(
        &self,
        master: &Path,
        start: u64,
        frames: u64,
        format: &SegmentFormat,
        output: &Path,
    ) -> Result<()>;

    /// Re-encode a whole clip, cover-scaled and centre-cropped
    async fn render_clip(&self, source: &Path, format: &SegmentFormat, output: &Path) -> Result<()>;

    /// Join the segments listed in `manifest`, in order, without re-encoding
    async fn concatenate(&self, manifest: &Path, output: &Path) -> Result<()>;
}
