//! Index metadata regeneration.
//!
//! The metadata itself (`repodata.json`, `channeldata.json`, ...) is produced
//! by an external [`Indexer`]. This module decides *when* it runs: at most one
//! run at a time per channel root and at most one queued follow-up, no matter
//! how many change notifications arrive or how many server processes share
//! the directory.

mod coordinator;
mod error;
mod indexer;

pub use coordinator::{
    CoordinatorState, CoordinatorStats, EXECUTING_LOCK_NAME, IndexCoordinator, PENDING_LOCK_NAME,
    Scheduled,
};
pub use error::{CoordinatorError, IndexerError};
pub use indexer::{CommandIndexer, Indexer};
