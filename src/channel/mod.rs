//! The conda channel served from disk.
//!
//! Thin glue over [`crate::atomic`]: uploads replace artifacts atomically,
//! deletes honor the same per-artifact lock, and index metadata is left to
//! [`crate::index`].

mod error;
mod hash;
mod platform;
mod store;

pub use error::ChannelError;
pub use hash::{digest_reader, md5_file, md5_reader, sha256_file, sha256_reader};
pub use platform::{NOARCH, PACKAGE_EXTENSIONS, PLATFORMS, is_package_file_name, is_platform};
pub use store::Channel;
