use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::staging::StagedContent;

/// Makes staged content the entire content of a resource in one step.
///
/// Publishing is a `rename(2)` of the staging file over the target. On the
/// same volume the kernel swaps the directory entry atomically: a concurrent
/// reader opens either the old file or the new one, never a mix. If the
/// rename fails the staging file is deleted and the target is untouched.
#[derive(Clone, Debug)]
pub struct AtomicPublisher {
    durable: bool,
}

impl AtomicPublisher {
    /// With `durable` set, the parent directory is fsynced after the rename.
    pub fn new(durable: bool) -> Self {
        Self { durable }
    }

    pub async fn commit(&self, staged: StagedContent, target: &Path) -> StoreResult<()> {
        let StagedContent { path, records, .. } = staged;
        let dest = target.to_path_buf();
        let persisted = tokio::task::spawn_blocking(move || path.persist(&dest))
            .await
            .map_err(|e| StoreError::internal("publish task", e))?;

        if let Err(err) = persisted {
            // Dropping the returned TempPath deletes the staged file.
            drop(err.path);
            return Err(StoreError::Publish {
                target: target.to_path_buf(),
                source: err.error,
            });
        }
        debug!(target = %target.display(), records, "staged content published");

        if self.durable {
            sync_parent(target).await;
        }
        Ok(())
    }
}

/// Persist the directory entry created by the rename. Failure here does not
/// undo a publish that is already visible, so it is only logged.
async fn sync_parent(target: &Path) {
    #[cfg(unix)]
    {
        let parent: PathBuf = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let synced = async {
            let dir = tokio::fs::File::open(&parent).await?;
            dir.sync_all().await
        }
        .await;
        if let Err(e) = synced {
            warn!(dir = %parent.display(), error = %e, "failed to sync parent directory");
        }
    }
    #[cfg(not(unix))]
    let _ = target;
}
