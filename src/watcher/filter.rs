//! Decides which change events are worth an index run.
//!
//! The indexer writes metadata and caches into the same tree it indexes.
//! Those writes must never trigger another run, otherwise every run
//! schedules the next one forever.

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use super::event::ChangeEvent;

/// Trailing decorations tools add to in-flight copies of a file:
/// `repodata.json.tmp`, `cache.db.3f2a9c1e`, `index.html-5b1c...-...`.
const SUFFIX: &str =
    r"(?:[.\-_](?:[0-9a-fA-F]{8}(?:-[0-9a-fA-F]{4}){3}-[0-9a-fA-F]{12}|[0-9a-fA-F]{6,}|tmp))*";

static GENERATED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    let names = [
        r"(?:current_)?repodata(?:_from_packages|_shards)?\.json(?:\.bz2|\.zst)?",
        r"channeldata\.json",
        r"patch_instructions\.json",
        r"index\.html",
        r"rss\.xml",
        r"cache\.db(?:-journal|-wal|-shm)?",
        r".+\.lock",
    ];
    let pattern = format!(r"^\.?(?:{}){SUFFIX}$", names.join("|"));
    Regex::new(&pattern).expect("generated-name pattern is valid")
});

/// Staging files created by [`crate::atomic::AtomicWriter`]:
/// `.<name>.<random>.tmp`.
static STAGING_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\..+\.[A-Za-z0-9]+\.tmp$").expect("staging pattern is valid")
});

const CACHE_DIR: &str = ".cache";

/// Whether `name` is a file the indexer or the server itself produces.
pub fn is_generated_name(name: &str) -> bool {
    GENERATED_NAME.is_match(name) || STAGING_NAME.is_match(name)
}

/// Predicate over change events under one channel root.
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    root: PathBuf,
}

impl ChangeFilter {
    /// `root` should be in the same form the watch backend reports paths
    /// in, which in practice means canonicalized.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn accept(&self, event: &ChangeEvent) -> bool {
        self.accept_path(&event.path)
    }

    pub fn accept_path(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };

        let in_cache = relative
            .components()
            .any(|c| matches!(c, Component::Normal(name) if name == CACHE_DIR));
        if in_cache {
            return false;
        }

        match relative.file_name().and_then(|n| n.to_str()) {
            Some(name) => !is_generated_name(name),
            // Non UTF-8 names are never ours.
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::event::ChangeKind;

    fn filter() -> ChangeFilter {
        ChangeFilter::new("/srv/channel")
    }

    #[test]
    fn test_generated_names() {
        for name in [
            "repodata.json",
            "repodata.json.bz2",
            "repodata.json.zst",
            "current_repodata.json",
            "repodata_from_packages.json",
            "repodata_shards.json",
            "channeldata.json",
            "patch_instructions.json",
            "index.html",
            "rss.xml",
            "cache.db",
            "cache.db-journal",
            "cache.db-wal",
            "cache.db-shm",
            "numpy-1.0-0.conda.lock",
            ".index_generation.lock",
            ".pending_index_generation.lock",
        ] {
            assert!(is_generated_name(name), "{name} should be generated");
        }
    }

    #[test]
    fn test_generated_names_with_suffix() {
        for name in [
            "repodata.json.tmp",
            "repodata.json.3f2a9c1e",
            "channeldata.json.0b8f4a2e-91c3-4d5e-8f6a-7b1c2d3e4f5a",
            "index.html-deadbeef",
            "cache.db_a1b2c3d4",
            "repodata.json.bz2.tmp",
            "a.conda.lock.tmp",
        ] {
            assert!(is_generated_name(name), "{name} should be generated");
        }
    }

    #[test]
    fn test_staging_names() {
        assert!(is_generated_name(".numpy-1.0-0.conda.Ab3xYz.tmp"));
        assert!(is_generated_name(".repodata.json.q1w2e3.tmp"));
    }

    #[test]
    fn test_package_names_are_not_generated() {
        for name in [
            "numpy-1.26.0-py311h0_0.conda",
            "zlib-1.2.13-h0_0.tar.bz2",
            "repodata.json.backup",
            "myrepodata.json",
            "locksmith-1.0-0.conda",
            "noarch",
        ] {
            assert!(!is_generated_name(name), "{name} should not be generated");
        }
    }

    #[test]
    fn test_accepts_packages() {
        let event = ChangeEvent::new(ChangeKind::Added, "/srv/channel/noarch/a-1.0-0.conda");
        assert!(filter().accept(&event));

        let event = ChangeEvent::new(ChangeKind::Added, "/srv/channel/linux-64");
        assert!(filter().accept(&event));
    }

    #[test]
    fn test_rejects_generated_files_anywhere() {
        let f = filter();
        assert!(!f.accept_path(Path::new("/srv/channel/noarch/repodata.json")));
        assert!(!f.accept_path(Path::new("/srv/channel/channeldata.json")));
        assert!(!f.accept_path(Path::new("/srv/channel/.index_generation.lock")));
        assert!(!f.accept_path(Path::new(
            "/srv/channel/noarch/.a-1.0-0.conda.k3j2h1.tmp"
        )));
    }

    #[test]
    fn test_rejects_cache_dir() {
        let f = filter();
        assert!(!f.accept_path(Path::new("/srv/channel/noarch/.cache")));
        assert!(!f.accept_path(Path::new("/srv/channel/noarch/.cache/stat.json")));
        assert!(!f.accept_path(Path::new(
            "/srv/channel/.cache/noarch/a-1.0-0.conda"
        )));
    }

    #[test]
    fn test_cache_above_root_is_fine() {
        let f = ChangeFilter::new("/home/user/.cache/channel");
        assert!(f.accept_path(Path::new(
            "/home/user/.cache/channel/noarch/a-1.0-0.conda"
        )));
    }

    #[test]
    fn test_rejects_outside_root() {
        let f = filter();
        assert!(!f.accept_path(Path::new("/srv/other/noarch/a-1.0-0.conda")));
        assert!(!f.accept_path(Path::new("/srv/channel-old/noarch/a-1.0-0.conda")));
    }
}
