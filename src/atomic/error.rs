//! Error types for atomic file replacement.

use std::path::PathBuf;
use thiserror::Error;

use crate::lock::LockError;

/// Errors from [`AtomicWriter`](super::AtomicWriter) operations.
#[derive(Error, Debug)]
pub enum AtomicWriteError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("{operation} failed for {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Mode '{0}' is read-only; atomic writes need a writable mode")]
    ReadOnlyMode(String),

    #[error("Unknown write mode '{0}'")]
    UnknownMode(String),

    #[error("Target {0} does not name a file")]
    InvalidTarget(PathBuf),
}

impl AtomicWriteError {
    pub(crate) fn io(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        AtomicWriteError::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Whether the write may succeed if attempted again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AtomicWriteError::Lock(e) if e.is_retryable())
    }
}

/// Lets [`AtomicWriter::write_with`](super::AtomicWriter::write_with) closures
/// work in plain `io::Result`.
impl From<AtomicWriteError> for std::io::Error {
    fn from(e: AtomicWriteError) -> Self {
        match e {
            AtomicWriteError::Lock(LockError::Timeout { .. }) => {
                std::io::Error::new(std::io::ErrorKind::TimedOut, e)
            }
            AtomicWriteError::Io { source, .. } => source,
            other => std::io::Error::other(other),
        }
    }
}
