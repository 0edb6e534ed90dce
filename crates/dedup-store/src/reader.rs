use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncBufRead, BufReader};

use crate::error::{StoreError, StoreResult};
use crate::record::{RecordReader, RecordSource};
use crate::resource::ResourceName;

/// Opens published resources for streaming.
#[derive(Clone, Debug)]
pub struct ResourceReader {
    root: PathBuf,
}

impl ResourceReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open `name` for reading.
    ///
    /// Fails with `NotFound` if nothing was ever published under that name.
    /// Invalid names are reported as `NotFound` too, since they can never
    /// have been published.
    pub async fn open(&self, name: &str) -> StoreResult<Records> {
        let resource =
            ResourceName::parse(name).map_err(|_| StoreError::NotFound(name.to_string()))?;
        let path = resource.resolve(&self.root);

        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if names_nothing(&e) => return Err(StoreError::NotFound(resource.to_string())),
            Err(e) => return Err(StoreError::ReadFailure(e)),
        };
        let meta = file.metadata().await.map_err(StoreError::ReadFailure)?;
        if !meta.is_file() {
            return Err(StoreError::NotFound(resource.to_string()));
        }

        Ok(Records::new(resource, BufReader::new(file)))
    }
}

/// Open errors meaning no resource exists at the path, e.g. `a/b` where
/// `a` is itself a resource file.
fn names_nothing(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory | io::ErrorKind::IsADirectory
    )
}

/// Lazy, forward-only sequence of records from one resource.
///
/// Records delivered before a storage error stay delivered: a failure part
/// way through surfaces as `ReadFailure` from the next call.
pub struct Records<R = BufReader<File>> {
    name: ResourceName,
    reader: RecordReader<R>,
    delivered: u64,
}

impl<R: AsyncBufRead + Unpin> Records<R> {
    pub fn new(name: ResourceName, inner: R) -> Self {
        Self {
            name,
            reader: RecordReader::new(inner, RecordSource::Storage),
            delivered: 0,
        }
    }

    pub fn name(&self) -> &ResourceName {
        &self.name
    }

    /// Records handed out so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub async fn next_record(&mut self) -> StoreResult<Option<Vec<u8>>> {
        let record = self.reader.next_record().await?;
        if record.is_some() {
            self.delivered += 1;
        }
        Ok(record)
    }

    /// Drain the remaining records into memory.
    pub async fn read_all(mut self) -> StoreResult<Vec<Vec<u8>>> {
        let mut out = Vec::new();
        while let Some(record) = self.next_record().await? {
            out.push(record);
        }
        Ok(out)
    }
}

impl<R> std::fmt::Debug for Records<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Records")
            .field("name", &self.name)
            .field("delivered", &self.delivered)
            .finish()
    }
}
