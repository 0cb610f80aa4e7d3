//! Cross-process locks backed by lock files.
//!
//! A lock is held while its lock file exists. Files are created with
//! `O_EXCL`, so exactly one process wins, and removed through an identity
//! check (device + inode) so a holder never deletes a lock that somebody
//! else re-created at the same path.
//!
//! # Staleness
//!
//! A holder that crashes leaves its lock file behind. Lock files whose mtime
//! is older than [`LockOptions::stale_after`] are reclaimed by the next
//! acquisition attempt. Long-lived holders call [`LockGuard::refresh`] every
//! [`LockOptions::heartbeat_interval`] to stay fresh.

mod error;
mod guard;
mod identity;

pub use error::LockError;
pub use guard::{LockGuard, LockOptions};
pub use identity::{FileIdentity, LockProbe, remove_if_identity, safe_remove};
