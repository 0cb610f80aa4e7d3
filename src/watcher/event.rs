//! Change events as the rest of the crate sees them.

use std::path::PathBuf;

use notify::EventKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

/// A path under the watched tree was added, modified or removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// Split a notify event into one change per affected path.
    ///
    /// Access events carry no change and yield nothing.
    pub fn from_notify(event: &notify::Event) -> Vec<Self> {
        let Some(kind) = change_kind(&event.kind) else {
            return Vec::new();
        };
        event
            .paths
            .iter()
            .map(|path| Self::new(kind, path.clone()))
            .collect()
    }
}

fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Added),
        // Renames land here too: both halves are reported as modifications.
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        EventKind::Remove(_) => Some(ChangeKind::Deleted),
        // Backends that cannot classify an event still saw a change.
        EventKind::Any => Some(ChangeKind::Modified),
        EventKind::Access(_) | EventKind::Other => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind, RenameMode};

    #[test]
    fn test_kinds() {
        let create = notify::Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/c/noarch/a.conda"));
        assert_eq!(
            ChangeEvent::from_notify(&create),
            vec![ChangeEvent::new(ChangeKind::Added, "/c/noarch/a.conda")]
        );

        let remove = notify::Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(PathBuf::from("/c/noarch/a.conda"));
        assert_eq!(ChangeEvent::from_notify(&remove)[0].kind, ChangeKind::Deleted);

        let access = notify::Event::new(EventKind::Access(AccessKind::Any))
            .add_path(PathBuf::from("/c/noarch/a.conda"));
        assert!(ChangeEvent::from_notify(&access).is_empty());
    }

    #[test]
    fn test_rename_yields_both_paths() {
        let rename = notify::Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/c/noarch/.a.conda.x1.tmp"))
            .add_path(PathBuf::from("/c/noarch/a.conda"));

        let changes = ChangeEvent::from_notify(&rename);
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.kind == ChangeKind::Modified));
        assert_eq!(changes[1].path, PathBuf::from("/c/noarch/a.conda"));
    }
}
