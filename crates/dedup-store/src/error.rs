use std::io;
use std::path::PathBuf;

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The resource name or the input stream is malformed.
    #[error("bad input: {0}")]
    BadInput(String),

    /// The client-side byte stream failed while a write was in progress.
    #[error("stream read failure: {0}")]
    StreamRead(#[source] io::Error),

    /// Staging or index storage refused a write (space or permission).
    #[error("insufficient storage while {context}: {source}")]
    InsufficientStorage {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    /// The atomic rename of staged content onto the resource failed.
    #[error("publish to {target} failed: {source}")]
    Publish {
        target: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The resource has never been published.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Storage failed while streaming a resource back.
    #[error("read failure: {0}")]
    ReadFailure(#[source] io::Error),

    /// Anything else: directory bootstrap, task joins, cache setup.
    #[error("internal failure: {0}")]
    Internal(String),
}

impl StoreError {
    pub(crate) fn storage(context: &'static str, source: io::Error) -> Self {
        Self::InsufficientStorage { context, source }
    }

    pub(crate) fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Internal(format!("{context}: {err}"))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
