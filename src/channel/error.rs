//! Error types for channel operations.

use std::path::PathBuf;
use thiserror::Error;

use crate::atomic::AtomicWriteError;
use crate::lock::LockError;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Unknown platform '{0}'")]
    UnknownPlatform(String),

    #[error("Channel directory {path} must not be named after a platform")]
    PlatformNamedRoot { path: PathBuf },

    #[error("'{0}' is not a package file name (expected <name>.conda or <name>.tar.bz2)")]
    InvalidPackageName(String),

    #[error("Package not found: {path}")]
    NotFound { path: PathBuf },

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Write(#[from] AtomicWriteError),

    #[error("{operation} failed for {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ChannelError {
    pub(crate) fn io(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        ChannelError::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}
