use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::error::{StoreError, StoreResult};

/// Where the bytes being split come from. Decides how I/O errors surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordSource {
    /// A client upload: failures are `StreamRead`.
    Client,
    /// A persisted resource: failures are `ReadFailure`.
    Storage,
}

/// Splits a byte stream into records on `\n`.
///
/// A record is the line content without its terminator (a trailing `\r` is
/// also stripped). Empty records are skipped. The reader is forward-only and
/// lazy: nothing is read ahead beyond what the underlying buffer holds.
pub struct RecordReader<R> {
    inner: R,
    source: RecordSource,
    max_len: Option<usize>,
    buf: Vec<u8>,
    eof: bool,
}

impl<R: AsyncBufRead + Unpin> RecordReader<R> {
    pub fn new(inner: R, source: RecordSource) -> Self {
        Self {
            inner,
            source,
            max_len: None,
            buf: Vec::new(),
            eof: false,
        }
    }

    /// Reject records longer than `max_len` bytes with `BadInput`. Zero disables the limit.
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = (max_len > 0).then_some(max_len);
        self
    }

    /// Next non-empty record, or `None` once the stream is exhausted.
    pub async fn next_record(&mut self) -> StoreResult<Option<Vec<u8>>> {
        while self.read_line().await? {
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
            if self.buf.is_empty() {
                continue;
            }
            self.check_len(self.buf.len())?;
            return Ok(Some(std::mem::take(&mut self.buf)));
        }
        Ok(None)
    }

    /// Fill `buf` with the next line. Returns `false` at end of stream.
    async fn read_line(&mut self) -> StoreResult<bool> {
        self.buf.clear();
        if self.eof {
            return Ok(false);
        }
        let source = self.source;
        loop {
            let available = match self.inner.fill_buf().await {
                Ok(available) => available,
                Err(e) => return Err(io_failure(source, e)),
            };
            if available.is_empty() {
                self.eof = true;
                return Ok(!self.buf.is_empty());
            }
            let (consumed, complete) = match available.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    self.buf.extend_from_slice(&available[..pos]);
                    (pos + 1, true)
                }
                None => {
                    self.buf.extend_from_slice(available);
                    (available.len(), false)
                }
            };
            self.inner.consume(consumed);
            // One byte of slack for a `\r` that is stripped later.
            self.check_len(self.buf.len().saturating_sub(1))?;
            if complete {
                return Ok(true);
            }
        }
    }

    fn check_len(&self, len: usize) -> StoreResult<()> {
        match self.max_len {
            Some(max) if len > max => Err(StoreError::BadInput(format!(
                "record exceeds maximum length of {max} bytes"
            ))),
            _ => Ok(()),
        }
    }
}

fn io_failure(source: RecordSource, err: std::io::Error) -> StoreError {
    match source {
        RecordSource::Client => StoreError::StreamRead(err),
        RecordSource::Storage => StoreError::ReadFailure(err),
    }
}
