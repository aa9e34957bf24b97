use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{EngineError, Result, SourceError};
use crate::timeline::{EntryKind, FrameEdge, FrameSourceResolver, StillSource, Timeline, TimelineEntry};
use crate::video::engine::TranscodeEngine;
use crate::video::types::{frame_spans, FrameSpan, ResolvedSegment, SegmentFormat, StillStrategy};
use crate::video::workspace::Workspace;

pub const MASTER_NAME: &str = "still_master.mp4";
pub const SHARED_FRAME_NAME: &str = "first_frame.jpg";

/// Rendered still master and where each still sits in it
struct StillMaster {
    path: PathBuf,
    spans: Vec<FrameSpan>,
}

/// Turns timeline entries into normalized segment files in the workspace
///
/// Entries are rendered one after the other, in timeline order. Each entry
/// produces exactly one segment file named after its kind and occurrence.
pub struct SegmentRenderer<'a> {
    engine: &'a dyn TranscodeEngine,
    workspace: &'a Workspace,
    timeline: &'a Timeline,
    format: SegmentFormat,
    strategy: StillStrategy,
}

impl<'a> SegmentRenderer<'a> {
    pub fn new(
        engine: &'a dyn TranscodeEngine,
        workspace: &'a Workspace,
        timeline: &'a Timeline,
        format: SegmentFormat,
        strategy: StillStrategy,
    ) -> Self {
        Self { engine, workspace, timeline, format, strategy }
    }

    pub fn format(&self) -> &SegmentFormat {
        &self.format
    }

    /// Render every entry, returning segment handles in timeline order
    pub async fn render_timeline(&self) -> Result<Vec<ResolvedSegment>> {
        let resolver = FrameSourceResolver::new(self.timeline);
        let master = self.prepare_master(&resolver).await?;

        let mut segments = Vec::with_capacity(self.timeline.len());
        for index in 0..self.timeline.len() {
            let segment = self.render_entry(&resolver, master.as_ref(), index).await?;
            debug!("Rendered {:?}", segment.path);
            segments.push(segment);
        }

        Ok(segments)
    }

    /// Render the shared still master when the policy and strategy call for one
    async fn prepare_master(&self, resolver: &FrameSourceResolver<'_>) -> Result<Option<StillMaster>> {
        if self.strategy != StillStrategy::Master {
            return Ok(None);
        }

        let source = match resolver.shared()? {
            Some(source) => source,
            None => return Ok(None),
        };

        let image = self.materialize(&source, SHARED_FRAME_NAME).await?;
        let spans = frame_spans(self.timeline, self.format.fps);
        let frames = spans.last().map(FrameSpan::end).unwrap_or(0);
        let path = self.workspace.path(MASTER_NAME);

        info!("🎞️  Rendering still master ({} frames) from {:?}", frames, image);
        self.engine.render_still(&image, frames, &self.format, &path).await?;
        Ok(Some(StillMaster { path, spans }))
    }

    async fn render_entry(
        &self,
        resolver: &FrameSourceResolver<'_>,
        master: Option<&StillMaster>,
        index: usize,
    ) -> Result<ResolvedSegment> {
        let entry = &self.timeline.entries()[index];
        let name = self.segment_name(index);
        let output = self.workspace.path(&format!("{}.mp4", name));
        let occurrence = self.timeline.occurrence(index).unwrap_or(1);

        let duration = match entry {
            TimelineEntry::Clip { source } => {
                info!("🎬 Rendering {} from {:?}", name, source);
                Self::check_readable(source)?;
                self.engine.render_clip(source, &self.format, &output).await?;
                None
            }
            TimelineEntry::Still { duration } => {
                match master {
                    Some(master) => {
                        let span = Self::master_span(master, index)?;
                        info!(
                            "🖼️  Cutting {} from master at frame {} ({} frames)",
                            name, span.start, span.frames
                        );
                        self.engine
                            .slice_still(&master.path, span.start, span.frames, &self.format, &output)
                            .await?;
                    }
                    None => {
                        let resolved = resolver.resolve(index)?.ok_or_else(|| SourceError::Unavailable {
                            path: output.clone(),
                            reason: "still entry did not resolve to a source".to_string(),
                        })?;
                        if resolved.fallback {
                            warn!(
                                "⚠️  No {} clip for {}, using fallback {:?}",
                                self.neighbour_side(),
                                name,
                                resolved.source
                            );
                        }

                        let frame_name = format!("frame_{}.jpg", name);
                        let image = self.materialize(&resolved.source, &frame_name).await?;
                        info!("🖼️  Rendering {} ({:.2}s) from {:?}", name, duration, image);
                        self.engine
                            .render_still(&image, self.format.frame_count(*duration), &self.format, &output)
                            .await?;
                    }
                }
                Some(*duration)
            }
        };

        Ok(ResolvedSegment {
            index,
            kind: entry.kind(),
            occurrence,
            path: output,
            duration,
            format: self.format.clone(),
        })
    }

    /// Turn a resolved source into an image file on disk
    async fn materialize(&self, source: &StillSource, frame_name: &str) -> Result<PathBuf> {
        match source {
            StillSource::Image(path) => {
                image::image_dimensions(path).map_err(|e| SourceError::Unavailable {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
                Ok(path.clone())
            }
            StillSource::ClipFrame { clip, edge } => {
                Self::check_readable(clip)?;
                let frame = self.workspace.path(frame_name);
                let which = match edge {
                    FrameEdge::First => "first",
                    FrameEdge::Last => "last",
                };
                info!("📸 Extracting {} frame from {:?}", which, clip);
                self.engine.extract_frame(clip, *edge, &self.format, &frame).await?;
                self.check_frame_size(&frame)?;
                Ok(frame)
            }
        }
    }

    fn check_frame_size(&self, frame: &Path) -> Result<()> {
        let expected = self.format.resolution;
        let (width, height) = image::image_dimensions(frame).map_err(|e| EngineError::RenderFailed {
            step: "extract frame".to_string(),
            target: frame.to_path_buf(),
            reason: e.to_string(),
        })?;

        if (width, height) != (expected.width, expected.height) {
            return Err(EngineError::RenderFailed {
                step: "extract frame".to_string(),
                target: frame.to_path_buf(),
                reason: format!("got {}x{}, expected {}", width, height, expected),
            }
            .into());
        }

        Ok(())
    }

    fn check_readable(clip: &Path) -> Result<()> {
        let metadata = std::fs::metadata(clip).map_err(|e| SourceError::Unavailable {
            path: clip.to_path_buf(),
            reason: e.to_string(),
        })?;

        if !metadata.is_file() || metadata.len() == 0 {
            return Err(SourceError::Unavailable {
                path: clip.to_path_buf(),
                reason: "not a file or empty".to_string(),
            }
            .into());
        }

        Ok(())
    }

    fn master_span(master: &StillMaster, index: usize) -> Result<FrameSpan> {
        master
            .spans
            .iter()
            .find(|span| span.index == index)
            .copied()
            .ok_or_else(|| {
                EngineError::RenderFailed {
                    step: "slice still".to_string(),
                    target: master.path.clone(),
                    reason: format!("entry {} has no place in the still master", index),
                }
                .into()
            })
    }

    fn segment_name(&self, index: usize) -> String {
        self.timeline
            .segment_name(index)
            .unwrap_or_else(|| format!("{}_{}", EntryKind::Still, index + 1))
    }

    fn neighbour_side(&self) -> &'static str {
        if self.timeline.policy().use_next_clip_frame {
            "next"
        } else {
            "previous"
        }
    }
}
