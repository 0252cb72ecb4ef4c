//! JSON-file artifact index.
//!
//! The index is one JSON object keyed by artifact id, each value
//! `{"filename": ..., "createdAt": <epoch ms>}`. Every mutation is a full
//! read, modify and write cycle under one async mutex, and the new document
//! replaces the old one through a rename, so readers never see a torn file.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use mfetch_models::{ArtifactId, ArtifactRecord};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};

/// Persisted shape of one index entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    filename: String,
    #[serde(rename = "createdAt", with = "chrono::serde::ts_milliseconds")]
    created_at: DateTime<Utc>,
}

type Index = BTreeMap<String, IndexEntry>;

fn to_record(id: &str, entry: IndexEntry) -> ArtifactRecord {
    ArtifactRecord {
        id: ArtifactId::from(id),
        filename: entry.filename,
        created_at: entry.created_at,
    }
}

/// Artifact file names must stay inside the artifacts directory.
fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains('\0')
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Records inspected
    pub scanned: usize,
    /// Expired records removed from the index
    pub removed: usize,
    /// Expired records whose file was already gone
    pub files_missing: usize,
    /// Expired records whose file could not be deleted
    pub files_failed: usize,
}

/// Persistent id → artifact registry with TTL expiry.
#[derive(Debug)]
pub struct ArtifactStore {
    index_path: PathBuf,
    artifacts_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl ArtifactStore {
    /// Open the store, creating the artifacts directory and an empty index
    /// (`{}`) when they do not exist yet.
    pub async fn open(
        index_path: impl Into<PathBuf>,
        artifacts_dir: impl Into<PathBuf>,
    ) -> StorageResult<Self> {
        let store = Self {
            index_path: index_path.into(),
            artifacts_dir: artifacts_dir.into(),
            write_lock: Mutex::new(()),
        };

        fs::create_dir_all(&store.artifacts_dir).await?;
        if let Some(parent) = store.index_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        match fs::metadata(&store.index_path).await {
            Ok(_) => {
                // Fail early on a corrupt index
                store.read_index().await?;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %store.index_path.display(), "Creating empty artifact index");
                store.write_index(&Index::new()).await?;
            }
            Err(e) => return Err(e.into()),
        }

        Ok(store)
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    /// Insert or overwrite one record and persist the whole index.
    pub async fn put(&self, record: &ArtifactRecord) -> StorageResult<()> {
        if !is_plain_filename(&record.filename) {
            return Err(StorageError::invalid_filename(&record.filename));
        }

        let _guard = self.write_lock.lock().await;
        let mut index = self.read_index().await?;
        index.insert(
            record.id.to_string(),
            IndexEntry {
                filename: record.filename.clone(),
                created_at: record.created_at,
            },
        );
        self.write_index(&index).await?;

        debug!(artifact_id = %record.id, filename = %record.filename, "Registered artifact");
        Ok(())
    }

    /// Look up one record.
    pub async fn get(&self, id: &ArtifactId) -> StorageResult<ArtifactRecord> {
        let mut index = self.read_index().await?;
        index
            .remove(id.as_str())
            .map(|entry| to_record(id.as_str(), entry))
            .ok_or_else(|| StorageError::not_found(id.as_str()))
    }

    /// All live records, ordered by id.
    pub async fn list(&self) -> StorageResult<Vec<ArtifactRecord>> {
        let index = self.read_index().await?;
        Ok(index
            .into_iter()
            .map(|(id, entry)| to_record(&id, entry))
            .collect())
    }

    /// Absolute path of a record's backing file.
    pub fn artifact_path(&self, record: &ArtifactRecord) -> StorageResult<PathBuf> {
        if !is_plain_filename(&record.filename) {
            return Err(StorageError::invalid_filename(&record.filename));
        }
        Ok(self.artifacts_dir.join(&record.filename))
    }

    /// Remove every record older than `ttl` at `now` together with its file.
    ///
    /// Files that are already gone count as removed. An expired record is
    /// dropped even when its file cannot be deleted; the failure is logged and
    /// counted. The index is only rewritten when at least one record was removed.
    pub async fn sweep(&self, now: DateTime<Utc>, ttl: Duration) -> StorageResult<SweepReport> {
        let _guard = self.write_lock.lock().await;
        let mut index = self.read_index().await?;
        let mut report = SweepReport {
            scanned: index.len(),
            ..Default::default()
        };

        let expired: Vec<String> = index
            .iter()
            .filter(|(id, entry)| to_record(id, (*entry).clone()).is_expired(now, ttl))
            .map(|(id, _)| id.clone())
            .collect();

        for id in expired {
            let Some(entry) = index.get(&id) else {
                continue;
            };

            if is_plain_filename(&entry.filename) {
                let path = self.artifacts_dir.join(&entry.filename);
                match fs::remove_file(&path).await {
                    Ok(()) => debug!(artifact_id = %id, path = %path.display(), "Deleted expired artifact"),
                    Err(e) if e.kind() == ErrorKind::NotFound => report.files_missing += 1,
                    Err(e) => {
                        warn!(artifact_id = %id, path = %path.display(), error = %e, "Failed to delete expired artifact");
                        report.files_failed += 1;
                    }
                }
            } else {
                warn!(artifact_id = %id, filename = %entry.filename, "Dropping record with invalid file name");
            }

            index.remove(&id);
            report.removed += 1;
        }

        if report.removed > 0 {
            self.write_index(&index).await?;
            info!(
                removed = report.removed,
                remaining = index.len(),
                "Swept expired artifacts"
            );
        }

        Ok(report)
    }

    /// Read the index; a missing or empty file is an empty index.
    async fn read_index(&self) -> StorageResult<Index> {
        let bytes = match fs::read(&self.index_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Index::new()),
            Err(e) => return Err(e.into()),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Index::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Replace the index file atomically. Callers hold the write lock.
    async fn write_index(&self, index: &Index) -> StorageResult<()> {
        let json = serde_json::to_vec_pretty(index)?;
        let tmp = self.index_path.with_extension("json.tmp");

        fs::write(&tmp, &json).await?;
        if let Err(e) = fs::rename(&tmp, &self.index_path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use mfetch_models::ARTIFACT_TTL;
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir) -> ArtifactStore {
        ArtifactStore::open(dir.path().join("db.json"), dir.path().join("downloads"))
            .await
            .unwrap()
    }

    async fn record_with_file(store: &ArtifactStore, name: &str, age: TimeDelta, now: DateTime<Utc>) -> ArtifactRecord {
        let mut record = ArtifactRecord::new(name);
        record.created_at = now - age;
        fs::write(store.artifacts_dir().join(name), b"data").await.unwrap();
        store.put(&record).await.unwrap();
        record
    }

    #[tokio::test]
    async fn test_open_writes_empty_index() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let raw = fs::read_to_string(store.index_path()).await.unwrap();
        assert_eq!(raw.trim(), "{}");
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_rejects_corrupt_index() {
        let dir = TempDir::new().unwrap();
        let index = dir.path().join("db.json");
        fs::write(&index, b"{not json").await.unwrap();

        let result = ArtifactStore::open(&index, dir.path().join("downloads")).await;
        assert!(matches!(result, Err(StorageError::Json(_))));
    }

    #[tokio::test]
    async fn test_put_get_persists_wire_format() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let record = ArtifactRecord::new("Song.mp3");

        store.put(&record).await.unwrap();

        let fetched = store.get(&record.id).await.unwrap();
        assert_eq!(fetched.filename, "Song.mp3");
        assert_eq!(
            fetched.created_at.timestamp_millis(),
            record.created_at.timestamp_millis()
        );

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(store.index_path()).await.unwrap()).unwrap();
        let entry = &raw[record.id.as_str()];
        assert_eq!(entry["filename"], "Song.mp3");
        assert_eq!(entry["createdAt"], record.created_at.timestamp_millis());
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let err = store.get(&ArtifactId::new()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_put_rejects_path_traversal() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let err = store.put(&ArtifactRecord::new("../db.json")).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidFilename(_)));
    }

    #[tokio::test]
    async fn test_sweep_expiry_boundary() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let now = Utc::now();
        let ttl_ms = ARTIFACT_TTL.as_millis() as i64;

        let expired = record_with_file(&store, "old.mp3", TimeDelta::milliseconds(ttl_ms + 1), now).await;
        let live = record_with_file(&store, "new.mp3", TimeDelta::milliseconds(ttl_ms - 1), now).await;

        let report = store.sweep(now, ARTIFACT_TTL).await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.removed, 1);

        assert!(store.get(&expired.id).await.unwrap_err().is_not_found());
        assert!(!store.artifacts_dir().join("old.mp3").exists());
        assert!(store.get(&live.id).await.is_ok());
        assert!(store.artifacts_dir().join("new.mp3").exists());
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let now = Utc::now();
        record_with_file(&store, "old.mp4", TimeDelta::hours(25), now).await;

        assert_eq!(store.sweep(now, ARTIFACT_TTL).await.unwrap().removed, 1);
        let before = fs::read(store.index_path()).await.unwrap();

        let second = store.sweep(now, ARTIFACT_TTL).await.unwrap();
        assert_eq!(second.removed, 0);
        assert_eq!(fs::read(store.index_path()).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_sweep_tolerates_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let now = Utc::now();

        let mut record = ArtifactRecord::new("gone.mp3");
        record.created_at = now - TimeDelta::hours(30);
        store.put(&record).await.unwrap();

        let report = store.sweep(now, ARTIFACT_TTL).await.unwrap();
        assert_eq!(report.removed, 1);
        assert_eq!(report.files_missing, 1);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_puts_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(open_store(&dir).await);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .put(&ArtifactRecord::new(format!("song{}.mp3", i)))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.list().await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_empty_index_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        fs::write(store.index_path(), b"").await.unwrap();

        assert!(store.list().await.unwrap().is_empty());
        assert_eq!(store.sweep(Utc::now(), ARTIFACT_TTL).await.unwrap(), SweepReport::default());
    }

    #[tokio::test]
    async fn test_sweep_drops_record_when_file_cannot_be_deleted() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let now = Utc::now();

        let mut record = ArtifactRecord::new("stuck.mp3");
        record.created_at = now - TimeDelta::hours(48);
        // A directory in place of the file makes remove_file fail
        fs::create_dir(store.artifacts_dir().join("stuck.mp3")).await.unwrap();
        store.put(&record).await.unwrap();

        let report = store.sweep(now, ARTIFACT_TTL).await.unwrap();

        assert_eq!(report.removed, 1);
        assert_eq!(report.files_failed, 1);
        assert!(store.get(&record.id).await.unwrap_err().is_not_found());
        assert!(store.list().await.unwrap().is_empty());
    }
}
