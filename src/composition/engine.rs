use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{
    config::{ProjectConfig, Settings},
    error::{ConfigError, Result},
    timeline::{FrameEdge, FrameSourceResolver, StillSource, Timeline, TimelineEntry},
    video::{SegmentRenderer, TranscodeEngine, Workspace},
};

use super::sequencer::AssemblySequencer;

/// Main composition engine that turns one project into one video
///
/// The engine follows a clear pipeline:
/// 1. Preflight - Make sure the transcoder can run at all
/// 2. Timeline - Build and validate the timeline from the project
/// 3. Workspace - Create the scratch directory and clear the previous run
/// 4. Rendering - Resolve still sources and render one segment per entry
/// 5. Assembly - Join the segments losslessly and move the result out
///
/// Any failing step aborts the run; the destination is only written once
/// every step has succeeded.
pub struct CompositionEngine {
    settings: Settings,
    project: ProjectConfig,
    base_dir: PathBuf,
    engine: Box<dyn TranscodeEngine>,
}

impl CompositionEngine {
    /// Create a new composition engine for `project`. Relative paths in the
    /// project and settings resolve against `base_dir`.
    pub fn new<P: Into<PathBuf>>(
        settings: Settings,
        project: ProjectConfig,
        base_dir: P,
        engine: Box<dyn TranscodeEngine>,
    ) -> Self {
        Self {
            settings,
            project,
            base_dir: base_dir.into(),
            engine,
        }
    }

    /// Where the finished video ends up
    pub fn destination(&self) -> PathBuf {
        self.base_dir.join(&self.project.output)
    }

    pub fn workspace_dir(&self) -> PathBuf {
        self.base_dir.join(&self.settings.workdir)
    }

    /// Main composition method - orchestrates the entire pipeline
    pub async fn compose(&self) -> Result<PathBuf> {
        info!("🎬 Starting montage composition");
        info!("   Output: {:?}", self.destination());
        info!("   Engine: {}", self.engine.name());

        // Pipeline Step 1: Preflight
        self.engine.preflight()?;

        // Pipeline Step 2: Timeline
        let timeline = self.build_timeline()?;

        // Pipeline Step 3: Workspace
        let workspace = Workspace::open(self.workspace_dir())?;
        self.check_workdir(&timeline, &workspace)?;
        workspace.purge(&self.project.output_name())?;

        // Pipeline Step 4: Rendering
        let format = self.settings.segment_format(timeline.resolution());
        let renderer = SegmentRenderer::new(
            self.engine.as_ref(),
            &workspace,
            &timeline,
            format,
            self.settings.still_strategy,
        );
        info!("🖼️  Rendering {} segments...", timeline.len());
        let segments = renderer.render_timeline().await?;

        // Pipeline Step 5: Assembly
        let sequencer = AssemblySequencer::new(self.engine.as_ref(), &workspace);
        let output = sequencer
            .assemble(&segments, &self.project.output_name(), &self.destination())
            .await?;

        info!("✅ Done: {:?}", output);
        Ok(output)
    }

    /// Build and validate the timeline for this project
    pub fn build_timeline(&self) -> Result<Timeline> {
        let timeline = self.project.timeline(&self.base_dir, self.settings.fps)?;
        info!(
            "⏱️  Timeline: {} entries ({} clips), {} @ {} fps, policy {}",
            timeline.len(),
            timeline.clip_count(),
            timeline.resolution(),
            timeline.frame_rate(),
            timeline.policy().mode()
        );
        Ok(timeline)
    }

    /// Media must live outside the workspace, which is purged on every run
    fn check_workdir(&self, timeline: &Timeline, workspace: &Workspace) -> Result<()> {
        let media = timeline
            .entries()
            .iter()
            .filter_map(TimelineEntry::clip_source)
            .chain(std::iter::once(timeline.policy().static_image.as_path()));

        for path in media {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            if workspace.is_same_directory(dir) {
                return Err(ConfigError::InvalidValue {
                    key: "settings.workdir".to_string(),
                    value: format!("{} (holds {})", self.settings.workdir.display(), self.display(path)),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Describe what a run would do, one line per timeline entry, without
    /// touching the workspace or the transcoder
    pub fn plan(&self) -> Result<Vec<String>> {
        let timeline = self.build_timeline()?;
        let resolver = FrameSourceResolver::new(&timeline);
        let resolved = resolver.resolve_all()?;
        debug!("Resolved {} entries", resolved.len());

        let lines = timeline
            .entries()
            .iter()
            .zip(resolved)
            .enumerate()
            .map(|(index, (entry, resolution))| {
                let name = timeline.segment_name(index).unwrap_or_default();
                match (entry, resolution) {
                    (TimelineEntry::Clip { source }, _) => {
                        format!("{:>2}. {:<10} clip {}", index + 1, name, self.display(source))
                    }
                    (TimelineEntry::Still { duration }, Some(resolution)) => format!(
                        "{:>2}. {:<10} {:.2}s from {}{}",
                        index + 1,
                        name,
                        duration,
                        self.describe(&resolution.source),
                        if resolution.fallback { " (fallback)" } else { "" }
                    ),
                    (TimelineEntry::Still { duration }, None) => {
                        format!("{:>2}. {:<10} {:.2}s", index + 1, name, duration)
                    }
                }
            })
            .collect();

        Ok(lines)
    }

    fn describe(&self, source: &StillSource) -> String {
        match source {
            StillSource::Image(path) => format!("image {}", self.display(path)),
            StillSource::ClipFrame { clip, edge: FrameEdge::First } => {
                format!("first frame of {}", self.display(clip))
            }
            StillSource::ClipFrame { clip, edge: FrameEdge::Last } => {
                format!("last frame of {}", self.display(clip))
            }
        }
    }

    fn display(&self, path: &Path) -> String {
        path.strip_prefix(&self.base_dir)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}
