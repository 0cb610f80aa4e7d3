//! Write coordination for a conda package channel served from a plain
//! directory.
//!
//! - [`lock`]: lock files with identity-checked removal and stale reclaim.
//! - [`atomic`]: staged, lock-serialized replacement of single files.
//! - [`index`]: coalescing scheduler for the external index generator.
//! - [`watcher`]: turns package changes into index requests, ignoring the
//!   generator's own output.
//! - [`channel`]: upload, delete, hash and list package artifacts.

pub mod atomic;
pub mod channel;
pub mod cli;
pub mod config;
pub mod index;
pub mod lock;
pub mod logging;
pub mod utils;
pub mod watcher;

pub use atomic::{AtomicFile, AtomicWriteError, AtomicWriter, WriteMode};
pub use channel::{Channel, ChannelError};
pub use config::Settings;
pub use index::{CommandIndexer, IndexCoordinator, Indexer, IndexerError, Scheduled};
pub use lock::{LockError, LockGuard, LockOptions};
pub use watcher::{ChangeEvent, ChangeFilter, ChangeKind, ChannelWatcher, WatchHandle};
