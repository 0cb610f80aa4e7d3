//! Channel file watcher for automatic re-indexing.
//!
//! # Architecture
//!
//! ```text
//! notify::RecommendedWatcher (recursive on the channel root)
//!         |
//!    ChangeEvent ---> ChangeFilter (drops the indexer's own output)
//!         |
//!     Debouncer (one batch per quiet period)
//!         |
//!  IndexCoordinator::request()
//! ```

mod channel_watcher;
mod debouncer;
mod error;
mod event;
mod filter;

pub use channel_watcher::{ChannelWatcher, ChannelWatcherBuilder, WatchHandle};
pub use debouncer::Debouncer;
pub use error::WatchError;
pub use event::{ChangeEvent, ChangeKind};
pub use filter::{ChangeFilter, is_generated_name};
