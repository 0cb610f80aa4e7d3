//! Filesystem identity checks for lock files.
//!
//! A lock file is only ever deleted by someone who can prove it is still the
//! same file they looked at. Path existence is not enough: between a stale
//! check and the unlink another process may have removed the file and created
//! a fresh one at the same path.

use std::fs::{self, File, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Device + inode pair identifying one concrete file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    pub fn from_metadata(meta: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            dev: meta.dev(),
            ino: meta.ino(),
        }
    }

    // No inode numbers through std here; creation time is the closest stand-in.
    #[cfg(not(unix))]
    pub fn from_metadata(meta: &Metadata) -> Self {
        let created = meta
            .created()
            .ok()
            .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Self {
            dev: 0,
            ino: created,
        }
    }

    /// Identity of whatever currently lives at `path`, `None` if nothing does.
    pub fn of_path(path: &Path) -> io::Result<Option<Self>> {
        match fs::symlink_metadata(path) {
            Ok(meta) => Ok(Some(Self::from_metadata(&meta))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Unlink `path` only if it still has identity `expected`.
///
/// Returns `Ok(true)` when the file was removed, `Ok(false)` when it was
/// already gone or has been replaced by a different file.
pub fn remove_if_identity(path: &Path, expected: FileIdentity) -> io::Result<bool> {
    match FileIdentity::of_path(path)? {
        Some(current) if current == expected => match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        },
        Some(_) => {
            crate::debug_event!("lock", "replaced, left in place", "{}", path.display());
            Ok(false)
        }
        None => Ok(false),
    }
}

/// An open handle on an existing lock file plus the identity it had when opened.
///
/// Holding the handle keeps the inode alive, so the identity cannot be
/// recycled for a newly created file while the probe exists.
#[derive(Debug)]
pub struct LockProbe {
    path: PathBuf,
    _file: File,
    identity: FileIdentity,
    modified: Option<SystemTime>,
}

impl LockProbe {
    /// Open the lock file at `path`. `Ok(None)` if there is none.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Option<Self>> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let meta = file.metadata()?;

        Ok(Some(Self {
            path: path.to_path_buf(),
            identity: FileIdentity::from_metadata(&meta),
            modified: meta.modified().ok(),
            _file: file,
        }))
    }

    pub fn identity(&self) -> FileIdentity {
        self.identity
    }

    /// Time since the lock file was created or last refreshed.
    pub fn age(&self) -> Option<Duration> {
        self.modified
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
    }

    /// Re-stat the path and unlink it if it is still the probed file.
    pub fn remove_if_unchanged(self) -> io::Result<bool> {
        remove_if_identity(&self.path, self.identity)
    }
}

/// Remove the lock file at `path` without ever deleting a file that
/// replaced it concurrently. A missing file counts as already removed.
pub fn safe_remove(path: impl AsRef<Path>) -> io::Result<bool> {
    match LockProbe::open(path)? {
        Some(probe) => probe.remove_if_unchanged(),
        None => Ok(false),
    }
}
