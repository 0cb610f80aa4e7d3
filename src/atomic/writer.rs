//! Staged, lock-serialized file replacement.

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::error::AtomicWriteError;
use super::mode::WriteMode;
use crate::lock::{LockGuard, LockOptions};
use crate::utils::parent_dir;

/// Lock file guarding writes to `target`: `<target>.lock`.
pub fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

/// Replaces files atomically, one writer per path at a time.
///
/// All writers, in this process or any other, take `<target>.lock` before
/// touching the target. New content is built in a hidden staging file next to
/// the target and renamed over it on commit.
#[derive(Debug, Clone, Default)]
pub struct AtomicWriter {
    lock_options: LockOptions,
}

impl AtomicWriter {
    pub fn new(lock_options: LockOptions) -> Self {
        Self { lock_options }
    }

    pub fn lock_options(&self) -> &LockOptions {
        &self.lock_options
    }

    /// Start a write to `path`.
    ///
    /// Blocks until the path's lock is free (bounded by the configured lock
    /// timeout). The returned [`AtomicFile`] must be [`commit`](AtomicFile::commit)ted;
    /// dropping it discards the staged content.
    pub fn begin(
        &self,
        path: impl AsRef<Path>,
        mode: WriteMode,
    ) -> Result<AtomicFile, AtomicWriteError> {
        let target = path.as_ref().to_path_buf();
        let file_name = target
            .file_name()
            .ok_or_else(|| AtomicWriteError::InvalidTarget(target.clone()))?
            .to_string_lossy()
            .into_owned();

        let lock = LockGuard::acquire(lock_path_for(&target), &self.lock_options)?;

        let dir = parent_dir(&target);
        let mut staging = tempfile::Builder::new()
            .prefix(&format!(".{file_name}."))
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| AtomicWriteError::io("create staging file", dir, e))?;

        if mode.copies_existing() {
            match File::open(&target) {
                Ok(mut existing) => {
                    io::copy(&mut existing, &mut staging)
                        .map_err(|e| AtomicWriteError::io("copy existing content", &target, e))?;
                    if mode.rewinds() {
                        staging
                            .seek(SeekFrom::Start(0))
                            .map_err(|e| AtomicWriteError::io("rewind", staging.path(), e))?;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(AtomicWriteError::io("open target", &target, e)),
            }
        }

        crate::debug_event!(
            "atomic",
            "begin",
            "{} ({mode}) via {}",
            target.display(),
            staging.path().display()
        );

        Ok(AtomicFile {
            target,
            staging,
            _lock: lock,
        })
    }

    /// Run `body` against a staged copy of `path` and commit on `Ok`.
    ///
    /// On `Err` (or a panic inside `body`) the target is left exactly as it
    /// was and the error is returned unchanged.
    pub fn write_with<T, E, F>(&self, path: impl AsRef<Path>, mode: WriteMode, body: F) -> Result<T, E>
    where
        F: FnOnce(&mut AtomicFile) -> Result<T, E>,
        E: From<AtomicWriteError>,
    {
        let mut file = self.begin(path, mode)?;
        match body(&mut file) {
            Ok(value) => {
                file.commit()?;
                Ok(value)
            }
            Err(e) => {
                file.abort();
                Err(e)
            }
        }
    }
}

/// Writable handle on a staged replacement for one target file.
///
/// Field order matters: the staging file is removed before the lock is
/// released.
#[derive(Debug)]
pub struct AtomicFile {
    target: PathBuf,
    staging: NamedTempFile,
    _lock: LockGuard,
}

impl AtomicFile {
    /// The file that will be replaced on commit.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Path of the staging file. Never visible under the target name.
    pub fn staging_path(&self) -> &Path {
        self.staging.path()
    }

    /// Drop everything after the current cursor position.
    pub fn truncate(&mut self) -> io::Result<()> {
        let position = self.staging.stream_position()?;
        self.staging.as_file().set_len(position)
    }

    /// Flush, sync and atomically rename the staged content onto the target.
    pub fn commit(self) -> Result<(), AtomicWriteError> {
        let AtomicFile {
            target,
            staging,
            _lock: lock,
        } = self;

        // The staging file is renamed or removed by the time this returns.
        let result = persist_durably(staging, &target);
        drop(lock);

        if result.is_ok() {
            crate::debug_event!("atomic", "committed", "{}", target.display());
        }
        result
    }

    /// Discard the staged content and leave the target untouched.
    pub fn abort(self) {
        crate::debug_event!("atomic", "aborted", "{}", self.target.display());
    }
}

impl Read for AtomicFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.staging.read(buf)
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.staging.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.staging.flush()
    }
}

impl Seek for AtomicFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.staging.seek(pos)
    }
}

/// Persist the rename itself. Best effort: not every platform can fsync a
/// directory.
fn persist_durably(mut staging: NamedTempFile, target: &Path) -> Result<(), AtomicWriteError> {
    staging
        .flush()
        .map_err(|e| AtomicWriteError::io("flush", staging.path(), e))?;
    staging
        .as_file()
        .sync_all()
        .map_err(|e| AtomicWriteError::io("sync", staging.path(), e))?;

    // On failure the staging file travels back inside the error and is
    // removed when it drops.
    staging
        .persist(target)
        .map_err(|e| AtomicWriteError::io("rename", target, e.error))?;

    sync_dir(parent_dir(target));
    Ok(())
}

fn sync_dir(dir: &Path) {
    #[cfg(unix)]
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        crate::debug_event!("atomic", "dir sync failed", "{}: {e}", dir.display());
    }
    #[cfg(not(unix))]
    let _ = dir;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp") || name.ends_with(".lock"))
            .collect()
    }

    #[test]
    fn test_lock_path_for() {
        assert_eq!(
            lock_path_for(Path::new("/c/noarch/pkg-1.0-0.conda")),
            PathBuf::from("/c/noarch/pkg-1.0-0.conda.lock")
        );
    }

    #[test]
    fn test_overwrite_creates_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.bin");

        AtomicWriter::default()
            .write_with(&path, WriteMode::Overwrite, |f| f.write_all(b"hello"))
            .unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"hello");
        assert!(leftovers(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_overwrite_starts_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.txt");
        fs::write(&path, "old content that is long").unwrap();

        AtomicWriter::default()
            .write_with(&path, WriteMode::Overwrite, |f| f.write_all(b"new"))
            .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_update_reads_existing_from_start() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.json");
        fs::write(&path, r#"{"packages":["a","b"]}"#).unwrap();

        AtomicWriter::default()
            .write_with(&path, WriteMode::Update, |f| -> io::Result<()> {
                let mut current = String::new();
                f.read_to_string(&mut current)?;
                assert_eq!(current, r#"{"packages":["a","b"]}"#);

                f.seek(SeekFrom::Start(0))?;
                f.write_all(br#"{"packages":[]}"#)?;
                f.truncate()
            })
            .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"packages":[]}"#);
    }

    #[test]
    fn test_append_positions_cursor_at_end() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("log.txt");
        fs::write(&path, "one\n").unwrap();

        AtomicWriter::default()
            .write_with(&path, WriteMode::Append, |f| f.write_all(b"two\n"))
            .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_update_missing_target_starts_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fresh.txt");

        AtomicWriter::default()
            .write_with(&path, WriteMode::Update, |f| -> io::Result<()> {
                let mut current = String::new();
                f.read_to_string(&mut current)?;
                assert!(current.is_empty());
                f.write_all(b"created")
            })
            .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "created");
    }

    #[test]
    fn test_staging_is_hidden_sibling() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pkg.conda");

        let file = AtomicWriter::default()
            .begin(&path, WriteMode::Overwrite)
            .unwrap();
        let staging = file.staging_path().to_path_buf();

        assert_eq!(staging.parent(), path.parent());
        let name = staging.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".pkg.conda."));
        assert!(name.ends_with(".tmp"));
        assert!(!path.exists());
        assert!(lock_path_for(&path).exists());

        file.abort();
        assert!(!staging.exists());
        assert!(!lock_path_for(&path).exists());
    }

    #[test]
    fn test_error_leaves_target_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("keep.txt");
        fs::write(&path, "original").unwrap();

        let result = AtomicWriter::default().write_with(&path, WriteMode::Overwrite, |f| {
            f.write_all(b"partial")?;
            Err::<(), _>(io::Error::other("upload interrupted"))
        });

        assert_eq!(result.unwrap_err().to_string(), "upload interrupted");
        assert_eq!(fs::read_to_string(&path).unwrap(), "original");
        assert!(leftovers(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_directory_target_rejected() {
        let err = AtomicWriter::default()
            .begin("/", WriteMode::Overwrite)
            .unwrap_err();
        assert!(matches!(err, AtomicWriteError::InvalidTarget(_)));
    }

    #[test]
    fn test_failed_commit_removes_staging_and_lock() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("repodata.json");

        let mut file = AtomicWriter::default()
            .begin(&path, WriteMode::Overwrite)
            .unwrap();
        file.write_all(b"{}").unwrap();
        let staging = file.staging_path().to_path_buf();

        // A non-empty directory appears under the target name, so the
        // rename cannot replace it.
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), b"").unwrap();

        let err = file.commit().unwrap_err();
        assert!(matches!(err, AtomicWriteError::Io { .. }));
        assert!(!staging.exists());
        assert!(leftovers(temp_dir.path()).is_empty());
        assert!(path.join("keep").exists());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing").join("file.txt");

        let err = AtomicWriter::default()
            .begin(&path, WriteMode::Overwrite)
            .unwrap_err();
        assert!(matches!(err, AtomicWriteError::Lock(_)));
        assert!(!err.is_retryable());
    }
}
