use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};

/// File name prefix reserved for staged content. No resource name may use it.
pub const STAGING_PREFIX: &str = ".dedup-staging-";

/// Accumulates deduplicated records in a private file beside the target.
///
/// The file is created in the same directory the resource will be published
/// to, so the final rename never crosses a volume. Its name carries
/// [`STAGING_PREFIX`], which resource-name validation rejects, so readers
/// cannot reach it. Dropping the writer (or the [`StagedContent`] it
/// produces) deletes the file.
pub struct StagingWriter {
    file: BufWriter<tokio::fs::File>,
    path: TempPath,
    records: u64,
    bytes: u64,
}

impl StagingWriter {
    /// Create an empty staging file inside `dir`.
    pub async fn create(dir: &Path) -> StoreResult<Self> {
        let dir = dir.to_path_buf();
        let named = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(STAGING_PREFIX)
                .tempfile_in(&dir)
        })
        .await
        .map_err(|e| StoreError::internal("staging task", e))?
        .map_err(|e| StoreError::internal("creating staging file", e))?;

        let (file, path) = named.into_parts();
        debug!(path = %path.display(), "staging file created");
        Ok(Self {
            file: BufWriter::new(tokio::fs::File::from_std(file)),
            path,
            records: 0,
            bytes: 0,
        })
    }

    /// Append one record followed by `\n`.
    pub async fn append(&mut self, record: &[u8]) -> StoreResult<()> {
        self.file
            .write_all(record)
            .await
            .map_err(|e| StoreError::storage("appending to staging file", e))?;
        self.file
            .write_all(b"\n")
            .await
            .map_err(|e| StoreError::storage("appending to staging file", e))?;
        self.records += 1;
        self.bytes += record.len() as u64 + 1;
        Ok(())
    }

    /// Records appended so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush everything to the file and hand it over for publishing.
    ///
    /// With `sync` set, the data is fsynced before returning.
    pub async fn finish(mut self, sync: bool) -> StoreResult<StagedContent> {
        self.file
            .flush()
            .await
            .map_err(|e| StoreError::storage("flushing staging file", e))?;
        if sync {
            self.file
                .get_ref()
                .sync_all()
                .await
                .map_err(|e| StoreError::storage("syncing staging file", e))?;
        }
        Ok(StagedContent {
            path: self.path,
            records: self.records,
            bytes: self.bytes,
        })
    }
}

impl std::fmt::Debug for StagingWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingWriter")
            .field("path", &self.path.to_path_buf())
            .field("records", &self.records)
            .finish()
    }
}

/// A complete, flushed staging file waiting to be published.
///
/// Dropping it without publishing deletes the file.
#[derive(Debug)]
pub struct StagedContent {
    pub(crate) path: TempPath,
    pub records: u64,
    pub bytes: u64,
}

impl StagedContent {
    pub fn path(&self) -> PathBuf {
        self.path.to_path_buf()
    }
}

/// Delete staging files under `root` left by writes that never published.
/// Returns how many were removed.
pub(crate) fn remove_stale(root: &Path) -> usize {
    let mut removed = 0;
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry during staging sweep");
                continue;
            }
        };
        if !entry.file_type().is_file()
            || !entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX)
        {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %entry.path().display(), error = %e, "failed to remove stale staging file"),
        }
    }
    removed
}
