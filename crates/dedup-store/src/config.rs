use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which duplicate-index backend each write operation uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexStrategy {
    /// `HashSet` held in process memory for the duration of one write.
    #[default]
    InMemory,
    /// Marker-file directory under the cache root, one per write.
    DiskBacked,
}

impl std::fmt::Display for IndexStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InMemory => write!(f, "in-memory"),
            Self::DiskBacked => write!(f, "disk-backed"),
        }
    }
}

impl FromStr for IndexStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in-memory" | "memory" => Ok(Self::InMemory),
            "disk-backed" | "disk" => Ok(Self::DiskBacked),
            other => Err(format!(
                "unknown index strategy {other:?} (expected in-memory or disk-backed)"
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding published resources.
    pub storage_root: PathBuf,
    /// Directory holding transient disk-backed indexes.
    pub cache_root: PathBuf,
    pub index: IndexStrategy,
    /// fsync staged data before publishing and the directory after.
    pub durable_commit: bool,
    /// Longest accepted record in bytes; `0` means unlimited.
    pub max_record_len: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("/tmp/dedupSrvHome"),
            cache_root: PathBuf::from("/tmp/dedupSrvCache"),
            index: IndexStrategy::InMemory,
            durable_commit: true,
            max_record_len: 64 * 1024,
        }
    }
}

impl StoreConfig {
    /// Config rooted at the given directories with every other field defaulted.
    pub fn with_roots(storage_root: impl Into<PathBuf>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            cache_root: cache_root.into(),
            ..Self::default()
        }
    }

    pub fn with_index(mut self, index: IndexStrategy) -> Self {
        self.index = index;
        self
    }
}
