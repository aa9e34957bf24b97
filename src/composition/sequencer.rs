use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::video::workspace::MANIFEST_NAME;
use crate::video::{ResolvedSegment, TranscodeEngine, Workspace};

/// Joins rendered segments, in timeline order, into the final artifact
pub struct AssemblySequencer<'a> {
    engine: &'a dyn TranscodeEngine,
    workspace: &'a Workspace,
}

impl<'a> AssemblySequencer<'a> {
    pub fn new(engine: &'a dyn TranscodeEngine, workspace: &'a Workspace) -> Self {
        Self { engine, workspace }
    }

    /// Concat-demuxer manifest listing the segments by file name
    pub fn manifest(segments: &[ResolvedSegment]) -> String {
        segments
            .iter()
            .map(|segment| {
                let name = segment
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                format!("file '{}'\n", name.replace('\'', "'\\''"))
            })
            .collect()
    }

    pub fn write_manifest(&self, segments: &[ResolvedSegment]) -> Result<PathBuf> {
        let path = self.workspace.path(MANIFEST_NAME);
        fs::write(&path, Self::manifest(segments))?;
        debug!("Wrote manifest with {} entries to {:?}", segments.len(), path);
        Ok(path)
    }

    /// Stream copy only works when every segment shares one format
    pub fn ensure_uniform(segments: &[ResolvedSegment]) -> Result<()> {
        let first = match segments.first() {
            Some(first) => first,
            None => {
                return Err(EngineError::ConcatenationFailed {
                    reason: "no segments to join".to_string(),
                }
                .into())
            }
        };

        if let Some(odd) = segments.iter().find(|s| s.format != first.format) {
            return Err(EngineError::ConcatenationFailed {
                reason: format!(
                    "{:?} is {} @ {} fps {}, expected {} @ {} fps {}",
                    odd.path,
                    odd.format.resolution,
                    odd.format.fps,
                    odd.format.pixel_format,
                    first.format.resolution,
                    first.format.fps,
                    first.format.pixel_format,
                ),
            }
            .into());
        }

        Ok(())
    }

    /// Join `segments` into `output_name` inside the workspace and move the
    /// result to `destination`. Nothing reaches `destination` on failure.
    pub async fn assemble(
        &self,
        segments: &[ResolvedSegment],
        output_name: &str,
        destination: &Path,
    ) -> Result<PathBuf> {
        Self::ensure_uniform(segments)?;

        let manifest = self.write_manifest(segments)?;
        let artifact = self.workspace.path(output_name);

        info!("🔗 Concatenating {} segments", segments.len());
        self.engine.concatenate(&manifest, &artifact).await?;

        let moved = self.workspace.relocate(&artifact, destination)?;
        info!("📦 Moved {:?} to {:?}", artifact, moved);
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MontageError;
    use crate::timeline::{EntryKind, Resolution};
    use crate::video::testing::{Call, RecordingEngine};
    use crate::video::SegmentFormat;
    use tempfile::tempdir;

    fn format() -> SegmentFormat {
        SegmentFormat {
            resolution: Resolution::new(890, 1244),
            fps: 30.0,
            pixel_format: "yuv420p".into(),
            codec: "libx264".into(),
        }
    }

    fn segment(workspace: &Workspace, index: usize, name: &str) -> ResolvedSegment {
        let path = workspace.path(name);
        fs::write(&path, format!("{}\n", name)).unwrap();
        ResolvedSegment {
            index,
            kind: if name.starts_with("clip") { EntryKind::Clip } else { EntryKind::Still },
            occurrence: 1,
            path,
            duration: None,
            format: format(),
        }
    }

    #[test]
    fn test_manifest_keeps_order_and_escapes_quotes() {
        let dir = tempdir().unwrap();
        let workspace = Workspace::open(dir.path()).unwrap();
        let segments = vec![
            segment(&workspace, 0, "still_1.mp4"),
            segment(&workspace, 1, "clip_1.mp4"),
            segment(&workspace, 2, "it's.mp4"),
        ];

        assert_eq!(
            AssemblySequencer::manifest(&segments),
            "file 'still_1.mp4'\nfile 'clip_1.mp4'\nfile 'it'\\''s.mp4'\n"
        );
    }

    #[test]
    fn test_mixed_formats_are_rejected() {
        let dir = tempdir().unwrap();
        let workspace = Workspace::open(dir.path()).unwrap();
        let mut odd = segment(&workspace, 1, "clip_1.mp4");
        odd.format.fps = 25.0;
        let segments = vec![segment(&workspace, 0, "still_1.mp4"), odd];

        assert!(matches!(
            AssemblySequencer::ensure_uniform(&segments),
            Err(MontageError::Engine(EngineError::ConcatenationFailed { .. }))
        ));
        assert!(AssemblySequencer::ensure_uniform(&[]).is_err());
    }

    #[tokio::test]
    async fn test_assemble_joins_in_order_and_relocates() {
        let dir = tempdir().unwrap();
        let workspace = Workspace::open(dir.path().join("_work")).unwrap();
        let segments = vec![
            segment(&workspace, 0, "still_1.mp4"),
            segment(&workspace, 1, "clip_1.mp4"),
            segment(&workspace, 2, "still_2.mp4"),
        ];
        let engine = RecordingEngine::new();
        let destination = dir.path().join("braut_final.mp4");

        let moved = AssemblySequencer::new(&engine, &workspace)
            .assemble(&segments, "braut_final.mp4", &destination)
            .await
            .unwrap();

        assert_eq!(moved, destination);
        assert_eq!(
            fs::read_to_string(&destination).unwrap(),
            "still_1.mp4\nclip_1.mp4\nstill_2.mp4\n"
        );
        assert!(!workspace.path("braut_final.mp4").exists());
        assert_eq!(engine.calls(), vec![Call::Concat { output: "braut_final.mp4".into() }]);
    }

    #[tokio::test]
    async fn test_failed_concat_relocates_nothing() {
        let dir = tempdir().unwrap();
        let workspace = Workspace::open(dir.path().join("_work")).unwrap();
        let segments = vec![segment(&workspace, 0, "still_1.mp4")];
        let engine = RecordingEngine::failing("concat");
        let destination = dir.path().join("final.mp4");

        let err = AssemblySequencer::new(&engine, &workspace)
            .assemble(&segments, "final.mp4", &destination)
            .await
            .unwrap_err();

        assert!(matches!(err, MontageError::Engine(EngineError::ConcatenationFailed { .. })));
        assert!(!destination.exists());
    }
}
