//! Package artifacts on disk.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use super::error::ChannelError;
use super::hash::{md5_file, sha256_file};
use super::platform::{NOARCH, is_package_file_name, is_platform};
use crate::atomic::{AtomicWriter, WriteMode, lock_path_for};
use crate::lock::LockGuard;

/// A conda channel directory: one subdirectory per platform, package
/// artifacts inside, index metadata generated next to them.
///
/// Every mutation goes through the artifact's `.lock` file so uploads and
/// deletes of the same package never interleave.
#[derive(Debug, Clone)]
pub struct Channel {
    root: PathBuf,
    writer: AtomicWriter,
}

impl Channel {
    /// Open (creating if needed) the channel at `root`.
    ///
    /// `noarch/` is created up front; conda clients expect it even when empty.
    pub fn open(root: impl Into<PathBuf>, writer: AtomicWriter) -> Result<Self, ChannelError> {
        let root = root.into();
        let noarch = root.join(NOARCH);
        fs::create_dir_all(&noarch)
            .map_err(|e| ChannelError::io("create channel directory", &noarch, e))?;

        let root = root
            .canonicalize()
            .map_err(|e| ChannelError::io("resolve channel directory", &root, e))?;
        if root
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(is_platform)
        {
            return Err(ChannelError::PlatformNamedRoot { path: root });
        }

        crate::debug_event!("channel", "open", "{}", root.display());
        Ok(Self { root, writer })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn writer(&self) -> &AtomicWriter {
        &self.writer
    }

    pub fn platform_dir(&self, platform: &str) -> Result<PathBuf, ChannelError> {
        if !is_platform(platform) {
            return Err(ChannelError::UnknownPlatform(platform.to_string()));
        }
        Ok(self.root.join(platform))
    }

    pub fn package_path(&self, platform: &str, file_name: &str) -> Result<PathBuf, ChannelError> {
        let dir = self.platform_dir(platform)?;
        if !is_package_file_name(file_name) {
            return Err(ChannelError::InvalidPackageName(file_name.to_string()));
        }
        Ok(dir.join(file_name))
    }

    /// Store `content` as `<platform>/<file_name>`, replacing any existing
    /// artifact atomically. Returns the number of bytes written.
    pub fn upload(
        &self,
        platform: &str,
        file_name: &str,
        content: &mut impl Read,
    ) -> Result<u64, ChannelError> {
        let path = self.package_path(platform, file_name)?;
        let dir = self.root.join(platform);
        fs::create_dir_all(&dir)
            .map_err(|e| ChannelError::io("create platform directory", &dir, e))?;

        let written = self
            .writer
            .write_with(&path, WriteMode::Overwrite, |file| {
                io::copy(content, file).map_err(|e| ChannelError::io("write package", &path, e))
            })?;

        crate::log_event!("channel", "uploaded", "{platform}/{file_name} ({written} bytes)");
        Ok(written)
    }

    /// Remove `<platform>/<file_name>` and its lock file.
    pub fn delete(&self, platform: &str, file_name: &str) -> Result<(), ChannelError> {
        let path = self.package_path(platform, file_name)?;

        // Wait out any in-flight upload of the same artifact.
        let lock = LockGuard::acquire(lock_path_for(&path), self.writer.lock_options())?;

        if !path.is_file() {
            return Err(ChannelError::NotFound { path });
        }
        fs::remove_file(&path).map_err(|e| ChannelError::io("delete package", &path, e))?;

        // Identity-checked, so a lock taken by a newer writer in the meantime
        // survives.
        lock.release()?;

        crate::log_event!("channel", "deleted", "{platform}/{file_name}");
        Ok(())
    }

    /// Hex SHA-256 of `<platform>/<file_name>`.
    pub fn sha256(&self, platform: &str, file_name: &str) -> Result<String, ChannelError> {
        let path = self.package_path(platform, file_name)?;
        if !path.is_file() {
            return Err(ChannelError::NotFound { path });
        }
        sha256_file(&path).map_err(|e| ChannelError::io("hash package", &path, e))
    }

    /// Hex MD5 of `<platform>/<file_name>`.
    pub fn md5(&self, platform: &str, file_name: &str) -> Result<String, ChannelError> {
        let path = self.package_path(platform, file_name)?;
        if !path.is_file() {
            return Err(ChannelError::NotFound { path });
        }
        md5_file(&path).map_err(|e| ChannelError::io("hash package", &path, e))
    }

    /// Package file names under `platform`, sorted.
    pub fn packages(&self, platform: &str) -> Result<Vec<String>, ChannelError> {
        let dir = self.platform_dir(platform)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ChannelError::io("list platform directory", &dir, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ChannelError::io("list platform directory", &dir, e))?;
            if !entry.file_type().is_ok_and(|t| t.is_file()) {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if is_package_file_name(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}
