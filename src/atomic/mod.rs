//! Crash-safe, atomic replacement of files.
//!
//! ```text
//! begin(path)
//!   lock    <path>.lock            (serializes writers across processes)
//!   stage   .<name>.XXXXXX.tmp     (same directory => same filesystem)
//!   seed    copy of <path>         (Update / Append only)
//! commit
//!   flush + fsync staging
//!   rename staging -> path        (readers see old or new, never partial)
//!   fsync directory
//! ```
//!
//! Dropping an uncommitted [`AtomicFile`] removes the staging file and
//! releases the lock without touching the target.

mod error;
mod mode;
mod writer;

pub use error::AtomicWriteError;
pub use mode::WriteMode;
pub use writer::{AtomicFile, AtomicWriter, lock_path_for};
