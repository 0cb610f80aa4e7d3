//! Error types for index regeneration.

use thiserror::Error;

use crate::lock::LockError;

/// Failure of a single indexer invocation.
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Index command is empty")]
    EmptyCommand,

    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{0}")]
    Other(String),
}

/// Errors from scheduling index runs.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("Failed to spawn index worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Channel root {path} is not a directory")]
    InvalidRoot { path: std::path::PathBuf },
}
