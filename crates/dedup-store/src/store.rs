use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncBufRead;
use tracing::{debug, info, warn};

use crate::config::{IndexStrategy, StoreConfig};
use crate::disk::{self, DiskIndex};
use crate::error::{StoreError, StoreResult};
use crate::memory::InMemoryIndex;
use crate::publish::AtomicPublisher;
use crate::reader::{Records, ResourceReader};
use crate::record::{RecordReader, RecordSource};
use crate::resource::ResourceName;
use crate::staging::{self, StagingWriter};
use crate::traits::DuplicateIndex;

/// Outcome of a successful write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteSummary {
    /// Distinct non-empty records persisted.
    pub records_written: u64,
    /// Repeat occurrences that were discarded.
    pub duplicates_dropped: u64,
}

/// Lifecycle of a single write operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteState {
    Started,
    Deduplicating,
    Staged,
    Published,
    Aborted,
}

impl WriteState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Published | Self::Aborted)
    }
}

/// Artifacts removed by a recovery sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub index_dirs: usize,
    pub staging_files: usize,
}

/// One write request, end to end.
///
/// Owns its duplicate index exclusively. Nothing it does is visible to
/// readers until the final rename; any failure before that leaves the
/// previous content (or absence) of the resource untouched.
pub struct WriteOperation {
    resource: ResourceName,
    target: PathBuf,
    index: Box<dyn DuplicateIndex>,
    durable: bool,
    state: WriteState,
    summary: WriteSummary,
}

impl WriteOperation {
    pub fn new(
        resource: ResourceName,
        target: PathBuf,
        index: Box<dyn DuplicateIndex>,
        durable: bool,
    ) -> Self {
        Self {
            resource,
            target,
            index,
            durable,
            state: WriteState::Started,
            summary: WriteSummary::default(),
        }
    }

    pub fn state(&self) -> WriteState {
        self.state
    }

    pub fn summary(&self) -> WriteSummary {
        self.summary
    }

    /// Deduplicate `records` into `staging` and publish the result.
    ///
    /// Records are decided strictly in arrival order. On error the operation
    /// is `Aborted` and the staging file is gone.
    pub async fn run<R>(
        &mut self,
        records: &mut RecordReader<R>,
        staging: StagingWriter,
        publisher: &AtomicPublisher,
    ) -> StoreResult<WriteSummary>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        let result = self.process(records, staging, publisher).await;
        if let Err(err) = &result {
            self.transition(WriteState::Aborted);
            warn!(
                resource = %self.resource,
                records = self.summary.records_written,
                duplicates = self.summary.duplicates_dropped,
                error = %err,
                "write aborted"
            );
        }
        result
    }

    async fn process<R>(
        &mut self,
        records: &mut RecordReader<R>,
        mut staging: StagingWriter,
        publisher: &AtomicPublisher,
    ) -> StoreResult<WriteSummary>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        self.transition(WriteState::Deduplicating);
        while let Some(record) = records.next_record().await? {
            if self.index.observe(&record).await? {
                staging.append(&record).await?;
                self.summary.records_written += 1;
            } else {
                self.summary.duplicates_dropped += 1;
            }
        }

        let staged = staging.finish(self.durable).await?;
        self.transition(WriteState::Staged);

        publisher.commit(staged, &self.target).await?;
        self.transition(WriteState::Published);
        info!(
            resource = %self.resource,
            records = self.summary.records_written,
            duplicates = self.summary.duplicates_dropped,
            index = self.index.kind(),
            "write published"
        );
        Ok(self.summary)
    }

    /// Release the duplicate index. Cleanup failures are logged, never
    /// reported: the outcome of the write is already decided.
    pub async fn close(self) {
        let kind = self.index.kind();
        if let Err(e) = self.index.destroy().await {
            warn!(resource = %self.resource, index = kind, error = %e, "index cleanup failed");
        }
    }

    fn transition(&mut self, next: WriteState) {
        debug!(resource = %self.resource, from = ?self.state, to = ?next, "write state");
        self.state = next;
    }
}

/// Line-deduplicating resource store.
///
/// Holds only immutable configuration, so one instance can serve any number
/// of concurrent reads and writes. Writes to the same name race at the
/// publish rename: the last one to rename wins.
#[derive(Debug)]
pub struct DedupStore {
    config: StoreConfig,
    reader: ResourceReader,
    publisher: AtomicPublisher,
    recovered: SweepReport,
}

impl DedupStore {
    /// Create the storage and cache roots if needed, then sweep away anything
    /// a previous process left behind.
    pub async fn open(config: StoreConfig) -> StoreResult<Self> {
        create_private_dir(&config.storage_root)
            .await
            .map_err(|e| StoreError::internal("creating storage root", e))?;
        create_private_dir(&config.cache_root)
            .await
            .map_err(|e| StoreError::internal("creating cache root", e))?;

        let mut store = Self {
            reader: ResourceReader::new(&config.storage_root),
            publisher: AtomicPublisher::new(config.durable_commit),
            config,
            recovered: SweepReport::default(),
        };
        let report = store.sweep().await?;
        store.recovered = report;
        info!(
            storage_root = %store.config.storage_root.display(),
            cache_root = %store.config.cache_root.display(),
            index = %store.config.index,
            stale_index_dirs = report.index_dirs,
            stale_staging_files = report.staging_files,
            "store opened"
        );
        Ok(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// What the sweep in [`DedupStore::open`] removed.
    pub fn recovered(&self) -> SweepReport {
        self.recovered
    }

    /// Remove stale index directories and staging files.
    ///
    /// Only safe while no write is in flight against these roots.
    pub async fn sweep(&self) -> StoreResult<SweepReport> {
        let index_dirs = disk::remove_stale(&self.config.cache_root).await?;
        let root = self.config.storage_root.clone();
        let staging_files = tokio::task::spawn_blocking(move || staging::remove_stale(&root))
            .await
            .map_err(|e| StoreError::internal("sweep task", e))?;
        Ok(SweepReport {
            index_dirs,
            staging_files,
        })
    }

    /// Replace `name` with the deduplicated records of `input`.
    pub async fn write<R>(&self, name: &str, input: R) -> StoreResult<WriteSummary>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        let resource = ResourceName::parse(name)?;
        let target = resource.resolve(&self.config.storage_root);
        let parent = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.storage_root.clone());
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|e| StoreError::internal("creating resource directory", e))?;

        let index = self.new_index().await?;
        let staging = match StagingWriter::create(&parent).await {
            Ok(staging) => staging,
            Err(err) => {
                if let Err(e) = index.destroy().await {
                    warn!(resource = %resource, error = %e, "index cleanup failed");
                }
                return Err(err);
            }
        };

        let mut records = RecordReader::new(input, RecordSource::Client)
            .with_max_len(self.config.max_record_len);
        let mut op = WriteOperation::new(resource, target, index, self.config.durable_commit);
        let result = op.run(&mut records, staging, &self.publisher).await;
        op.close().await;
        result
    }

    /// Open `name` for streaming.
    pub async fn read(&self, name: &str) -> StoreResult<Records> {
        self.reader.open(name).await
    }

    async fn new_index(&self) -> StoreResult<Box<dyn DuplicateIndex>> {
        let index: Box<dyn DuplicateIndex> = match self.config.index {
            IndexStrategy::InMemory => Box::new(InMemoryIndex::new()),
            IndexStrategy::DiskBacked => Box::new(DiskIndex::create(&self.config.cache_root).await?),
        };
        debug!(index = index.kind(), "duplicate index ready");
        Ok(index)
    }
}

async fn create_private_dir(path: &Path) -> std::io::Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder.create(path).await
}
