//! Temp staging for job intermediates.
//!
//! Every path handed out by a [`StagingScope`] is tracked the moment it is
//! allocated and removed when the scope is released. Dropping an unreleased
//! scope still removes its files, synchronously and best-effort.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::MediaResult;

/// Kind of intermediate file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Audio,
    Video,
    Thumbnail,
}

impl StageKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            StageKind::Audio => "audio.tmp",
            StageKind::Video => "video.tmp",
            StageKind::Thumbnail => "thumb.tmp",
        }
    }
}

/// Outcome of releasing a set of paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseReport {
    pub removed: usize,
    /// Already gone, counted as success
    pub missing: usize,
    pub failed: Vec<PathBuf>,
}

impl ReleaseReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Delete every given path, tolerating files that are already gone.
pub async fn release_all<P: AsRef<Path>>(paths: &[P]) -> ReleaseReport {
    let mut report = ReleaseReport::default();

    for path in paths {
        let path = path.as_ref();
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Released staged file");
                report.removed += 1;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => report.missing += 1,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to release staged file");
                report.failed.push(path.to_path_buf());
            }
        }
    }

    report
}

/// Directory holding job intermediates.
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    /// Open the staging directory, creating it if needed.
    pub async fn create(dir: impl Into<PathBuf>) -> MediaResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// A fresh path for the given kind, unique for the process lifetime.
    ///
    /// Nothing is created on disk.
    pub fn allocate(&self, kind: StageKind) -> PathBuf {
        self.dir
            .join(format!("{}_{}", Uuid::new_v4().simple(), kind.suffix()))
    }

    /// Start a scope that owns every path it allocates.
    pub fn scope(&self) -> StagingScope {
        StagingScope {
            area: self.clone(),
            paths: Vec::new(),
        }
    }

    /// Delete every given path, tolerating files that are already gone.
    pub async fn release_all<P: AsRef<Path>>(&self, paths: &[P]) -> ReleaseReport {
        release_all(paths).await
    }

    /// Remove staged files older than `max_age`, left behind by a crashed
    /// process. Returns the number of files removed.
    pub async fn purge_stale(&self, max_age: Duration) -> MediaResult<usize> {
        let now = SystemTime::now();
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut stale = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let age = metadata
                .modified()
                .ok()
                .and_then(|m| now.duration_since(m).ok());
            if age.is_some_and(|age| age > max_age) {
                stale.push(entry.path());
            }
        }

        if stale.is_empty() {
            return Ok(0);
        }

        let report = release_all(&stale).await;
        info!(
            removed = report.removed,
            failed = report.failed.len(),
            "Purged stale staging files"
        );
        Ok(report.removed)
    }
}

/// Scoped ownership of a job's intermediate files.
#[derive(Debug)]
pub struct StagingScope {
    area: StagingArea,
    paths: Vec<PathBuf>,
}

impl StagingScope {
    /// Allocate and track a new staging path.
    pub fn allocate(&mut self, kind: StageKind) -> PathBuf {
        let path = self.area.allocate(kind);
        self.paths.push(path.clone());
        path
    }

    /// Track a path created elsewhere, e.g. a reserved output file.
    pub fn track(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    /// Stop tracking `path` so it survives release.
    pub fn keep(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Delete every tracked path.
    pub async fn release(mut self) -> ReleaseReport {
        let paths = std::mem::take(&mut self.paths);
        release_all(&paths).await
    }
}

impl Drop for StagingScope {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "Removed staged file on drop"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove staged file on drop"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_allocate_is_unique_and_lazy() {
        let dir = TempDir::new().unwrap();
        let area = StagingArea::create(dir.path()).await.unwrap();

        let a = area.allocate(StageKind::Audio);
        let b = area.allocate(StageKind::Audio);
        assert_ne!(a, b);
        assert!(!a.exists());
        assert!(a.to_string_lossy().ends_with("_audio.tmp"));
    }

    #[tokio::test]
    async fn test_release_all_tolerates_missing() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("present.tmp");
        tokio::fs::write(&present, b"x").await.unwrap();
        let missing = dir.path().join("missing.tmp");

        let report = release_all(&[present.clone(), missing]).await;
        assert_eq!(report.removed, 1);
        assert_eq!(report.missing, 1);
        assert!(report.is_clean());
        assert!(!present.exists());
    }

    #[tokio::test]
    async fn test_scope_release_keeps_kept_paths() {
        let dir = TempDir::new().unwrap();
        let area = StagingArea::create(dir.path()).await.unwrap();
        let mut scope = area.scope();

        let audio = scope.allocate(StageKind::Audio);
        let output = dir.path().join("Song.mp3");
        tokio::fs::write(&audio, b"a").await.unwrap();
        tokio::fs::write(&output, b"o").await.unwrap();
        scope.track(&output);
        scope.keep(&output);

        let report = scope.release().await;
        assert_eq!(report.removed, 1);
        assert!(!audio.exists());
        assert!(output.exists());
    }

    #[tokio::test]
    async fn test_scope_drop_removes_files() {
        let dir = TempDir::new().unwrap();
        let area = StagingArea::create(dir.path()).await.unwrap();

        let video = {
            let mut scope = area.scope();
            let video = scope.allocate(StageKind::Video);
            tokio::fs::write(&video, b"v").await.unwrap();
            video
        };

        assert!(!video.exists());
    }

    #[tokio::test]
    async fn test_purge_stale() {
        let dir = TempDir::new().unwrap();
        let area = StagingArea::create(dir.path()).await.unwrap();
        let leftover = area.allocate(StageKind::Thumbnail);
        tokio::fs::write(&leftover, b"t").await.unwrap();

        assert_eq!(area.purge_stale(Duration::from_secs(3600)).await.unwrap(), 0);
        assert!(leftover.exists());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(area.purge_stale(Duration::from_millis(1)).await.unwrap(), 1);
        assert!(!leftover.exists());
    }
}
