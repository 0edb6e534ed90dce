//! Line-deduplicating resource store.
//!
//! A write takes a newline-delimited byte stream and persists only the first
//! occurrence of each distinct record, in arrival order. A read streams the
//! stored records back.
//!
//! # Write Path
//!
//! 1. [`RecordReader`] splits the input into records, dropping empty lines.
//! 2. A [`DuplicateIndex`] answers "seen before?" for each record.
//! 3. [`StagingWriter`] appends first sightings to a private file.
//! 4. [`AtomicPublisher`] renames the staged file over the resource.
//! 5. The index is destroyed, on success and on failure alike.
//!
//! # Index Backends
//!
//! - [`InMemoryIndex`] -- `HashSet` per write, bounded by process memory
//! - [`DiskIndex`] -- marker-file directory per write, bounded by disk
//!
//! # Design Rules
//!
//! 1. Nothing a write does is visible until its final rename.
//! 2. A failed write leaves no staging file and no index directory behind.
//! 3. Readers see either the old or the new content of a resource, never a mix.
//! 4. Writes share no in-memory state; same-name writers race and the last
//!    rename wins.
//! 5. Storage and cache roots come from [`StoreConfig`], never from globals.

pub mod config;
pub mod disk;
pub mod error;
pub mod memory;
pub mod publish;
pub mod reader;
pub mod record;
pub mod resource;
pub mod staging;
pub mod store;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use config::{IndexStrategy, StoreConfig};
pub use disk::DiskIndex;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryIndex;
pub use publish::AtomicPublisher;
pub use reader::{Records, ResourceReader};
pub use record::{RecordReader, RecordSource};
pub use resource::ResourceName;
pub use staging::{StagedContent, StagingWriter};
pub use store::{DedupStore, SweepReport, WriteOperation, WriteState, WriteSummary};
pub use traits::DuplicateIndex;
