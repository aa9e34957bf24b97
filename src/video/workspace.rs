use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Result;

/// File extensions a previous run may have left behind
const ARTIFACT_EXTENSIONS: &[&str] = &["mp4", "jpg", "png"];
/// Stems of every file the renderer writes: segments, extracted frames, the
/// shared frame and the still master
const ARTIFACT_PREFIXES: &[&str] = &["still_", "clip_", "frame_still_", "first_frame"];
pub const MANIFEST_NAME: &str = "list.txt";

/// Run-scoped scratch directory for frames, segments and the concat manifest
///
/// One run owns the directory at a time; concurrent runs against the same
/// workspace are not supported.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Create the directory if needed
    pub fn open<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!("Workspace ready at {:?}", root);
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of an artifact inside the workspace
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Delete artifacts of a previous run: segments, frames, the manifest
    /// and `output_name`. Anything else, media included, is left alone.
    pub fn purge(&self, output_name: &str) -> Result<usize> {
        let mut removed = 0;

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type()?.is_file() || !Self::is_artifact(&path, output_name) {
                continue;
            }

            fs::remove_file(&path)?;
            removed += 1;
        }

        if removed > 0 {
            info!("🧹 Removed {} artifacts from previous run", removed);
        }
        Ok(removed)
    }

    /// Move a finished artifact to `destination`
    ///
    /// A plain rename when possible. Across filesystems the file is copied
    /// next to the destination first and renamed into place, so the
    /// destination never holds a partial file.
    pub fn relocate(&self, artifact: &Path, destination: &Path) -> Result<PathBuf> {
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        match fs::rename(artifact, destination) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(e.into()),
            Err(e) => {
                debug!("Rename failed ({}), copying across filesystems", e);
                let staging = Self::staging_path(destination);
                fs::copy(artifact, &staging)?;
                if let Err(e) = fs::rename(&staging, destination) {
                    let _ = fs::remove_file(&staging);
                    return Err(e.into());
                }
                fs::remove_file(artifact)?;
            }
        }

        Ok(destination.to_path_buf())
    }

    fn staging_path(destination: &Path) -> PathBuf {
        let mut name = destination
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".partial");
        destination.with_file_name(name)
    }

    /// Whether `dir` is the workspace directory itself
    pub fn is_same_directory(&self, dir: &Path) -> bool {
        match (fs::canonicalize(&self.root), fs::canonicalize(dir)) {
            (Ok(root), Ok(dir)) => root == dir,
            _ => false,
        }
    }

    fn is_artifact(path: &Path, output_name: &str) -> bool {
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return false,
        };
        if name == MANIFEST_NAME || name == output_name {
            return true;
        }

        let known_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ARTIFACT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);

        known_extension && ARTIFACT_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_directory() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("_work");

        let workspace = Workspace::open(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(workspace.path("clip_1.mp4"), root.join("clip_1.mp4"));
    }

    #[test]
    fn test_purge_only_removes_artifacts() {
        let dir = tempdir().unwrap();
        let workspace = Workspace::open(dir.path()).unwrap();

        for name in [
            "still_1.mp4",
            "clip_2.MP4",
            "frame_still_1.jpg",
            "first_frame.jpg",
            "still_master.mp4",
            "list.txt",
            "braut_final.mp4",
            "notes.md",
        ] {
            fs::write(workspace.path(name), b"x").unwrap();
        }
        fs::create_dir(workspace.path("clip_9.mp4")).unwrap();

        assert_eq!(workspace.purge("braut_final.mp4").unwrap(), 7);
        assert!(workspace.path("notes.md").exists());
        assert!(workspace.path("clip_9.mp4").is_dir());
        assert!(!workspace.path("list.txt").exists());
        assert_eq!(workspace.purge("braut_final.mp4").unwrap(), 0);
    }

    #[test]
    fn test_purge_keeps_media_sharing_the_directory() {
        let dir = tempdir().unwrap();
        let workspace = Workspace::open(dir.path()).unwrap();

        for name in ["A.mp4", "opa.jpg", "parkbank_bike.MP4", "cover.png", "still_1.mp4"] {
            fs::write(workspace.path(name), b"x").unwrap();
        }

        assert_eq!(workspace.purge("opa_final.mp4").unwrap(), 1);
        for name in ["A.mp4", "opa.jpg", "parkbank_bike.MP4", "cover.png"] {
            assert!(workspace.path(name).exists(), "{} was removed", name);
        }
    }

    #[test]
    fn test_is_same_directory() {
        let dir = tempdir().unwrap();
        let workspace = Workspace::open(dir.path().join("_work")).unwrap();

        assert!(workspace.is_same_directory(&dir.path().join("_work")));
        assert!(workspace.is_same_directory(&dir.path().join("_work").join("..").join("_work")));
        assert!(!workspace.is_same_directory(dir.path()));
        assert!(!workspace.is_same_directory(&dir.path().join("absent")));
    }

    #[test]
    fn test_relocate_moves_artifact() {
        let dir = tempdir().unwrap();
        let workspace = Workspace::open(dir.path().join("_work")).unwrap();
        let artifact = workspace.path("final.mp4");
        fs::write(&artifact, b"video").unwrap();

        let destination = dir.path().join("out").join("final.mp4");
        let moved = workspace.relocate(&artifact, &destination).unwrap();

        assert_eq!(moved, destination);
        assert!(!artifact.exists());
        assert_eq!(fs::read(&destination).unwrap(), b"video");
    }

    #[test]
    fn test_relocate_missing_artifact_leaves_no_output() {
        let dir = tempdir().unwrap();
        let workspace = Workspace::open(dir.path().join("_work")).unwrap();
        let destination = dir.path().join("final.mp4");

        assert!(workspace.relocate(&workspace.path("final.mp4"), &destination).is_err());
        assert!(!destination.exists());
    }
}
