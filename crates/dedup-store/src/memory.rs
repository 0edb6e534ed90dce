use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::traits::DuplicateIndex;

/// In-memory, HashSet-based duplicate index.
///
/// Holds a copy of every distinct record for the lifetime of one write
/// operation. Lookups and inserts are O(1) expected. There is no cap: a
/// write with enough distinct records can exhaust process memory.
pub struct InMemoryIndex {
    records: HashSet<Vec<u8>>,
    bytes: u64,
}

impl InMemoryIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self {
            records: HashSet::new(),
            bytes: 0,
        }
    }

    /// Number of distinct records held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing has been marked.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total record bytes retained by the index.
    pub fn total_bytes(&self) -> u64 {
        self.bytes
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DuplicateIndex for InMemoryIndex {
    async fn seen(&self, record: &[u8]) -> StoreResult<bool> {
        Ok(self.records.contains(record))
    }

    async fn mark(&mut self, record: &[u8]) -> StoreResult<bool> {
        if self.records.contains(record) {
            return Ok(false);
        }
        self.bytes += record.len() as u64;
        self.records.insert(record.to_vec());
        Ok(true)
    }

    fn entries(&self) -> u64 {
        self.records.len() as u64
    }

    fn kind(&self) -> &'static str {
        "in-memory"
    }

    async fn destroy(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryIndex")
            .field("entries", &self.records.len())
            .field("bytes", &self.bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unseen_until_marked() {
        let mut index = InMemoryIndex::new();
        assert!(!index.seen(b"alpha").await.unwrap());
        assert!(index.mark(b"alpha").await.unwrap());
        assert!(index.seen(b"alpha").await.unwrap());
        assert!(!index.seen(b"beta").await.unwrap());
    }

    #[tokio::test]
    async fn second_mark_reports_duplicate() {
        let mut index = InMemoryIndex::new();
        assert!(index.mark(b"x").await.unwrap());
        assert!(!index.mark(b"x").await.unwrap());
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn observe_combines_query_and_insert() {
        let mut index = InMemoryIndex::new();
        assert!(index.observe(b"a").await.unwrap());
        assert!(index.observe(b"b").await.unwrap());
        assert!(!index.observe(b"a").await.unwrap());
        assert_eq!(index.entries(), 2);
    }

    #[tokio::test]
    async fn keys_are_exact_bytes() {
        let mut index = InMemoryIndex::new();
        index.mark(b"abc").await.unwrap();
        assert!(!index.seen(b"abc ").await.unwrap());
        assert!(!index.seen(b"ABC").await.unwrap());
        assert!(index.mark(&[0xff, 0x00, 0xfe]).await.unwrap());
        assert!(index.seen(&[0xff, 0x00, 0xfe]).await.unwrap());
    }

    #[tokio::test]
    async fn tracks_total_bytes() {
        let mut index = InMemoryIndex::new();
        index.mark(b"12345").await.unwrap();
        index.mark(b"123456789").await.unwrap();
        index.mark(b"12345").await.unwrap();
        assert_eq!(index.total_bytes(), 14);
    }

    #[tokio::test]
    async fn destroy_through_trait_object() {
        let mut index: Box<dyn DuplicateIndex> = Box::new(InMemoryIndex::default());
        index.mark(b"a").await.unwrap();
        assert_eq!(index.kind(), "in-memory");
        index.destroy().await.unwrap();
    }

    #[test]
    fn debug_format() {
        let index = InMemoryIndex::new();
        let debug = format!("{index:?}");
        assert!(debug.contains("InMemoryIndex"));
        assert!(debug.contains("entries"));
    }
}
