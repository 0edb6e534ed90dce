use async_trait::async_trait;

use crate::error::StoreResult;

/// Per-write membership structure used to detect repeated records.
///
/// An index instance belongs to exactly one write operation and is never
/// shared. Implementations must satisfy these invariants:
/// - `seen` is a pure query: it never changes what later calls observe.
/// - `mark` is create-if-absent. It returns `true` only for the call that
///   first records the key; every later call for the same bytes returns `false`.
/// - Keys are the exact record bytes. Two records are the same entry iff
///   their bytes are equal.
/// - `destroy` releases all transient state, including anything on disk.
#[async_trait]
pub trait DuplicateIndex: Send + Sync {
    /// Whether `record` has been marked during this operation.
    async fn seen(&self, record: &[u8]) -> StoreResult<bool>;

    /// Record `record` as seen. Returns `false` if it was already present.
    async fn mark(&mut self, record: &[u8]) -> StoreResult<bool>;

    /// Query and insert in one step. Returns `true` for a first sighting.
    ///
    /// The default calls `seen` then `mark`. Backends whose `mark` is already
    /// an atomic create may override this to skip the query.
    async fn observe(&mut self, record: &[u8]) -> StoreResult<bool> {
        if self.seen(record).await? {
            return Ok(false);
        }
        self.mark(record).await
    }

    /// Number of distinct records marked so far.
    fn entries(&self) -> u64;

    /// Short backend name for logs.
    fn kind(&self) -> &'static str;

    /// Tear down the index and everything it allocated.
    async fn destroy(self: Box<Self>) -> StoreResult<()>;
}
