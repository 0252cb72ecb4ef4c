//! Filesystem utilities for artifact placement.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use mfetch_models::truncate_to_bytes;
use tokio::fs::{self, OpenOptions};

use crate::error::{MediaError, MediaResult};

/// Upper bound on ` (n)` suffixes tried before giving up.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Common filesystem limit on one path component.
const MAX_FILE_NAME_BYTES: usize = 255;

/// Bytes kept free for the largest ` (n)` suffix.
const SUFFIX_RESERVE: usize = 6;

/// Reserve a fresh file named `{stem}.{ext}` inside `dir`.
///
/// The file is created empty with `create_new`, so two concurrent callers can
/// never receive the same path. On conflict ` (1)`, ` (2)`, ... is appended to
/// the stem. Stems too long for the filesystem are cut on a char boundary.
/// The directory is created if missing.
///
/// # Errors
///
/// Returns an error if the directory cannot be created, a non-conflict IO
/// error occurs, or no free name is found.
pub async fn reserve_unique_path(dir: &Path, stem: &str, ext: &str) -> MediaResult<PathBuf> {
    fs::create_dir_all(dir).await?;

    let budget = MAX_FILE_NAME_BYTES.saturating_sub(ext.len() + 1 + SUFFIX_RESERVE);
    let stem = truncate_to_bytes(stem, budget);

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = if attempt == 0 {
            format!("{}.{}", stem, ext)
        } else {
            format!("{} ({}).{}", stem, attempt, ext)
        };
        let candidate = dir.join(name);

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(MediaError::from(e)),
        }
    }

    Err(MediaError::internal(format!(
        "no free file name for {}.{} in {}",
        stem,
        ext,
        dir.display()
    )))
}

/// File name component of a path as UTF-8.
pub fn file_name_of(path: &Path) -> MediaResult<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| MediaError::internal(format!("invalid file name: {}", path.display())))
}
