//! Lock-file backed mutual exclusion.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use serde::Serialize;

use super::error::LockError;
use super::identity::{FileIdentity, LockProbe, remove_if_identity};

/// How a lock is waited for and when an abandoned one may be reclaimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOptions {
    /// Delay between attempts while the lock is held elsewhere.
    pub poll_interval: Duration,
    /// Give up blocking acquisition after this long. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Lock files not refreshed for this long belong to a dead holder.
    /// `None` never reclaims.
    pub stale_after: Option<Duration>,
}

impl LockOptions {
    /// How often a long-lived holder should call [`LockGuard::refresh`].
    pub fn heartbeat_interval(&self) -> Duration {
        self.stale_after
            .map(|stale| (stale / 4).max(self.poll_interval))
            .unwrap_or(Duration::from_secs(60))
    }
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            timeout: Some(Duration::from_secs(30)),
            stale_after: Some(Duration::from_secs(600)),
        }
    }
}

/// Written into every lock file so a human can tell who holds it.
#[derive(Serialize)]
struct LockRecord {
    pid: u32,
    acquired_at: String,
}

/// A held lock. The lock file exists exactly as long as the guard does.
///
/// Dropping the guard releases the lock, removing the lock file only if it is
/// still the file this guard created.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    identity: FileIdentity,
    // Kept open until after the unlink so the inode cannot be recycled.
    file: File,
    released: bool,
}

impl LockGuard {
    /// Block until the lock at `path` is acquired or `options.timeout` elapses.
    pub fn acquire(path: impl AsRef<Path>, options: &LockOptions) -> Result<Self, LockError> {
        let path = path.as_ref();
        let started = Instant::now();
        let mut waited = false;

        loop {
            if let Some(guard) = Self::try_acquire(path, options)? {
                if waited {
                    crate::debug_event!(
                        "lock",
                        "acquired",
                        "{} after {:?}",
                        path.display(),
                        started.elapsed()
                    );
                }
                return Ok(guard);
            }

            let mut pause = options.poll_interval;
            if let Some(timeout) = options.timeout {
                let elapsed = started.elapsed();
                if elapsed >= timeout {
                    return Err(LockError::Timeout {
                        path: path.to_path_buf(),
                        waited: elapsed,
                    });
                }
                pause = pause.min(timeout - elapsed);
            }

            if !waited {
                crate::debug_event!("lock", "waiting", "{}", path.display());
                waited = true;
            }
            thread::sleep(pause);
        }
    }

    /// Take the lock if nobody holds it. Never blocks.
    pub fn try_acquire(
        path: impl AsRef<Path>,
        options: &LockOptions,
    ) -> Result<Option<Self>, LockError> {
        let path = path.as_ref();
        if let Some(guard) = Self::create(path)? {
            return Ok(Some(guard));
        }

        if let Some(stale_after) = options.stale_after {
            if Self::reclaim_stale(path, stale_after)? {
                return Self::create(path);
            }
        }

        Ok(None)
    }

    /// Whether some holder currently owns the lock at `path`.
    pub fn is_locked(path: impl AsRef<Path>) -> bool {
        path.as_ref().symlink_metadata().is_ok()
    }

    /// Whether the lock at `path` is held by a live holder.
    ///
    /// Unlike [`is_locked`](Self::is_locked), a lock file that `options`
    /// would reclaim as stale counts as free.
    pub fn is_held(path: impl AsRef<Path>, options: &LockOptions) -> bool {
        let Ok(meta) = path.as_ref().symlink_metadata() else {
            return false;
        };
        let Some(stale_after) = options.stale_after else {
            return true;
        };
        meta.modified()
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_none_or(|age| age < stale_after)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mark the lock as alive so it is not reclaimed as stale.
    pub fn refresh(&self) -> Result<(), LockError> {
        self.file
            .set_modified(SystemTime::now())
            .map_err(|e| LockError::io(&self.path, e))
    }

    /// Release the lock now and report cleanup failures to the caller.
    pub fn release(mut self) -> Result<(), LockError> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<(), LockError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let removed =
            remove_if_identity(&self.path, self.identity).map_err(|e| LockError::io(&self.path, e))?;
        if removed {
            crate::debug_event!("lock", "released", "{}", self.path.display());
        }
        Ok(())
    }

    fn create(path: &Path) -> Result<Option<Self>, LockError> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(LockError::io(path, e)),
        };

        // Without an identity the file cannot be removed safely; it is left
        // for stale reclamation.
        let identity = file
            .metadata()
            .map(|meta| FileIdentity::from_metadata(&meta))
            .map_err(|e| LockError::io(path, e))?;

        let record = LockRecord {
            pid: std::process::id(),
            acquired_at: crate::utils::utc_now_rfc3339(),
        };
        if let Err(e) = serde_json::to_writer(&mut file, &record)
            .map_err(io::Error::from)
            .and_then(|()| file.flush())
        {
            tracing::warn!("[lock] failed to write holder record to {}: {e}", path.display());
        }

        Ok(Some(Self {
            path: path.to_path_buf(),
            identity,
            file,
            released: false,
        }))
    }

    /// Remove the lock at `path` if its holder stopped refreshing it.
    ///
    /// Returns `true` when the path is free afterwards.
    fn reclaim_stale(path: &Path, stale_after: Duration) -> Result<bool, LockError> {
        let probe = match LockProbe::open(path).map_err(|e| LockError::io(path, e))? {
            Some(probe) => probe,
            None => return Ok(true),
        };

        match probe.age() {
            Some(age) if age >= stale_after => {
                tracing::warn!(
                    "[lock] reclaiming stale lock {} (untouched for {}s)",
                    path.display(),
                    age.as_secs()
                );
                probe
                    .remove_if_unchanged()
                    .map_err(|e| LockError::io(path, e))
            }
            _ => Ok(false),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            tracing::warn!("[lock] failed to release: {e}");
        }
    }
}
