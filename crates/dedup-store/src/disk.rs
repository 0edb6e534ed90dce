use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::traits::DuplicateIndex;

/// Name prefix of per-operation index directories under the cache root.
pub const INDEX_DIR_PREFIX: &str = "op-";

/// Disk-backed duplicate index.
///
/// Each write operation gets its own directory under the cache root:
///
/// ```text
/// <cache_root>/op-<uuid>/<2 hex>/<62 hex>
/// ```
///
/// A record maps to one zero-length marker file named by the BLAKE3 digest
/// of its bytes, so membership is a file-existence check and insertion is an
/// exclusive create. Memory use is constant regardless of input size. The
/// directory is removed by [`DuplicateIndex::destroy`], or on drop if the
/// operation never got that far.
pub struct DiskIndex {
    dir: PathBuf,
    entries: u64,
    shards: [bool; 256],
    destroyed: bool,
}

impl DiskIndex {
    /// Create a fresh, empty index directory under `cache_root`.
    pub async fn create(cache_root: &Path) -> StoreResult<Self> {
        let dir = cache_root.join(format!("{INDEX_DIR_PREFIX}{}", Uuid::now_v7()));
        tokio::fs::create_dir(&dir)
            .await
            .map_err(|e| StoreError::internal("creating index directory", e))?;
        debug!(dir = %dir.display(), "disk index created");
        Ok(Self {
            dir,
            entries: 0,
            shards: [false; 256],
            destroyed: false,
        })
    }

    /// Directory holding this index's markers.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn marker(&self, record: &[u8]) -> (usize, PathBuf) {
        let digest = blake3::hash(record);
        let name = hex::encode(digest.as_bytes());
        let shard = digest.as_bytes()[0] as usize;
        (shard, self.dir.join(&name[..2]).join(&name[2..]))
    }

    async fn ensure_shard(&mut self, shard: usize, marker: &Path) -> StoreResult<()> {
        if self.shards[shard] {
            return Ok(());
        }
        if let Some(parent) = marker.parent() {
            match tokio::fs::create_dir(parent).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(StoreError::storage("creating index shard", e)),
            }
        }
        self.shards[shard] = true;
        Ok(())
    }
}

#[async_trait]
impl DuplicateIndex for DiskIndex {
    async fn seen(&self, record: &[u8]) -> StoreResult<bool> {
        let (_, marker) = self.marker(record);
        tokio::fs::try_exists(&marker)
            .await
            .map_err(|e| StoreError::storage("querying index marker", e))
    }

    async fn mark(&mut self, record: &[u8]) -> StoreResult<bool> {
        let (shard, marker) = self.marker(record);
        self.ensure_shard(shard, &marker).await?;
        let created = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&marker)
            .await;
        match created {
            Ok(_) => {
                self.entries += 1;
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(StoreError::storage("writing index marker", e)),
        }
    }

    /// The exclusive create already answers membership, so skip the stat.
    async fn observe(&mut self, record: &[u8]) -> StoreResult<bool> {
        self.mark(record).await
    }

    fn entries(&self) -> u64 {
        self.entries
    }

    fn kind(&self) -> &'static str {
        "disk-backed"
    }

    async fn destroy(self: Box<Self>) -> StoreResult<()> {
        let mut this = self;
        this.destroyed = true;
        tokio::fs::remove_dir_all(&this.dir)
            .await
            .map_err(|e| StoreError::internal("removing index directory", e))?;
        debug!(dir = %this.dir.display(), entries = this.entries, "disk index removed");
        Ok(())
    }
}

impl Drop for DiskIndex {
    /// Inside a runtime the removal runs on the blocking pool, so a large
    /// abandoned index does not stall a worker. If the runtime is shutting
    /// down the directory may survive until the next sweep.
    fn drop(&mut self) {
        if self.destroyed {
            return;
        }
        let dir = std::mem::take(&mut self.dir);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || remove_abandoned(&dir));
            }
            Err(_) => remove_abandoned(&dir),
        }
    }
}

fn remove_abandoned(dir: &Path) {
    if let Err(e) = std::fs::remove_dir_all(dir) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(dir = %dir.display(), error = %e, "failed to remove abandoned index directory");
        }
    }
}

impl std::fmt::Debug for DiskIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskIndex")
            .field("dir", &self.dir)
            .field("entries", &self.entries)
            .finish()
    }
}

/// Remove index directories left behind by operations that never finished
/// (crash, kill). Returns how many were removed.
pub(crate) async fn remove_stale(cache_root: &Path) -> StoreResult<usize> {
    let mut removed = 0;
    let mut dir = tokio::fs::read_dir(cache_root)
        .await
        .map_err(|e| StoreError::internal("listing cache root", e))?;
    while let Some(entry) = dir
        .next_entry()
        .await
        .map_err(|e| StoreError::internal("listing cache root", e))?
    {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(INDEX_DIR_PREFIX) {
            continue;
        }
        let path = entry.path();
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(dir = %path.display(), error = %e, "failed to remove stale index directory"),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_directory_under_cache_root() {
        let cache = tempfile::tempdir().unwrap();
        let index = DiskIndex::create(cache.path()).await.unwrap();
        assert!(index.path().starts_with(cache.path()));
        assert!(index.path().is_dir());
        let name = index.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(INDEX_DIR_PREFIX));
    }

    #[tokio::test]
    async fn unseen_until_marked() {
        let cache = tempfile::tempdir().unwrap();
        let mut index = DiskIndex::create(cache.path()).await.unwrap();
        assert!(!index.seen(b"alpha").await.unwrap());
        assert!(index.mark(b"alpha").await.unwrap());
        assert!(index.seen(b"alpha").await.unwrap());
        assert!(!index.seen(b"beta").await.unwrap());
    }

    #[tokio::test]
    async fn exclusive_create_detects_duplicates() {
        let cache = tempfile::tempdir().unwrap();
        let mut index = DiskIndex::create(cache.path()).await.unwrap();
        assert!(index.observe(b"x").await.unwrap());
        assert!(!index.observe(b"x").await.unwrap());
        assert!(!index.mark(b"x").await.unwrap());
        assert_eq!(index.entries(), 1);
    }

    #[tokio::test]
    async fn markers_are_zero_length() {
        let cache = tempfile::tempdir().unwrap();
        let mut index = DiskIndex::create(cache.path()).await.unwrap();
        index.mark(b"some record").await.unwrap();
        let (_, marker) = index.marker(b"some record");
        let meta = std::fs::metadata(&marker).unwrap();
        assert!(meta.is_file());
        assert_eq!(meta.len(), 0);
    }

    #[tokio::test]
    async fn records_with_path_characters_are_safe() {
        let cache = tempfile::tempdir().unwrap();
        let mut index = DiskIndex::create(cache.path()).await.unwrap();
        assert!(index.observe(b"../../etc/passwd").await.unwrap());
        assert!(index.observe(b"a/b/c").await.unwrap());
        assert!(index.observe(&vec![b'z'; 4096]).await.unwrap());
        assert!(!index.observe(b"a/b/c").await.unwrap());
        assert_eq!(index.entries(), 3);
    }

    #[tokio::test]
    async fn destroy_removes_directory() {
        let cache = tempfile::tempdir().unwrap();
        let mut index = DiskIndex::create(cache.path()).await.unwrap();
        index.mark(b"a").await.unwrap();
        let dir = index.path().to_path_buf();
        Box::new(index).destroy().await.unwrap();
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn drop_removes_directory_in_background() {
        let cache = tempfile::tempdir().unwrap();
        let dir = {
            let mut index = DiskIndex::create(cache.path()).await.unwrap();
            index.mark(b"a").await.unwrap();
            index.path().to_path_buf()
        };
        for _ in 0..200 {
            if !dir.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(!dir.exists());
    }

    #[test]
    fn drop_outside_runtime_removes_directory() {
        let cache = tempfile::tempdir().unwrap();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let index = rt.block_on(async {
            let mut index = DiskIndex::create(cache.path()).await.unwrap();
            index.mark(b"a").await.unwrap();
            index
        });
        drop(rt);

        let dir = index.path().to_path_buf();
        drop(index);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn separate_operations_do_not_share_state() {
        let cache = tempfile::tempdir().unwrap();
        let mut first = DiskIndex::create(cache.path()).await.unwrap();
        let second = DiskIndex::create(cache.path()).await.unwrap();
        first.mark(b"shared").await.unwrap();
        assert!(!second.seen(b"shared").await.unwrap());
        assert_ne!(first.path(), second.path());
    }

    #[tokio::test]
    async fn create_fails_without_cache_root() {
        let cache = tempfile::tempdir().unwrap();
        let missing = cache.path().join("missing");
        let err = DiskIndex::create(&missing).await.unwrap_err();
        assert!(matches!(err, StoreError::Internal(_)));
    }

    #[tokio::test]
    async fn remove_stale_only_touches_index_dirs() {
        let cache = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(cache.path().join("op-stale/ab")).unwrap();
        std::fs::write(cache.path().join("op-stale/ab/cd"), b"").unwrap();
        std::fs::create_dir(cache.path().join("keep-me")).unwrap();

        let removed = remove_stale(cache.path()).await.unwrap();
        assert_eq!(removed, 1);
        assert!(!cache.path().join("op-stale").exists());
        assert!(cache.path().join("keep-me").exists());
    }
}
