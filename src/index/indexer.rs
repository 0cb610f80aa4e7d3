//! The external metadata generator.

use std::path::Path;
use std::process::{Command, Stdio};

use super::error::IndexerError;

/// Regenerates every derived metadata file under a channel root from the
/// artifacts currently on disk.
///
/// Implementations are blocking and may be slow. They always recompute from
/// scratch, which is what makes coalescing requests safe.
pub trait Indexer: Send + Sync {
    /// Name for logging.
    fn name(&self) -> &str {
        "indexer"
    }

    fn regenerate(&self, channel_root: &Path) -> Result<(), IndexerError>;
}

impl<F> Indexer for F
where
    F: Fn(&Path) -> Result<(), IndexerError> + Send + Sync,
{
    fn regenerate(&self, channel_root: &Path) -> Result<(), IndexerError> {
        self(channel_root)
    }
}

/// Runs an external command with the channel root appended as last argument,
/// e.g. `python -m conda_index <root>`.
#[derive(Debug, Clone)]
pub struct CommandIndexer {
    program: String,
    args: Vec<String>,
}

impl CommandIndexer {
    pub fn new(command: &[String]) -> Result<Self, IndexerError> {
        let (program, args) = command.split_first().ok_or(IndexerError::EmptyCommand)?;
        if program.trim().is_empty() {
            return Err(IndexerError::EmptyCommand);
        }
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Indexer for CommandIndexer {
    fn name(&self) -> &str {
        &self.program
    }

    fn regenerate(&self, channel_root: &Path) -> Result<(), IndexerError> {
        crate::debug_event!(
            "index",
            "exec",
            "{} {} {}",
            self.program,
            self.args.join(" "),
            channel_root.display()
        );

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(channel_root)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| IndexerError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        // Only the tail is interesting; indexers can be chatty.
        let tail: Vec<&str> = stderr.lines().rev().take(20).collect();
        Err(IndexerError::Failed {
            program: self.program.clone(),
            status: output.status.to_string(),
            stderr: tail.into_iter().rev().collect::<Vec<_>>().join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_empty_command_rejected() {
        assert!(matches!(
            CommandIndexer::new(&[]),
            Err(IndexerError::EmptyCommand)
        ));
        assert!(matches!(
            CommandIndexer::new(&[" ".to_string()]),
            Err(IndexerError::EmptyCommand)
        ));
    }

    #[test]
    fn test_closure_is_indexer() {
        let calls = AtomicUsize::new(0);
        let indexer = |_: &Path| -> Result<(), IndexerError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        };
        indexer.regenerate(Path::new(".")).unwrap();
        assert_eq!(indexer.name(), "indexer");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_program_reports_spawn_error() {
        let indexer =
            CommandIndexer::new(&["conda-server-no-such-indexer-binary".to_string()]).unwrap();
        let err = indexer.regenerate(Path::new(".")).unwrap_err();
        assert!(matches!(err, IndexerError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_receives_root_and_reports_failure() {
        let temp_dir = tempfile::TempDir::new().unwrap();

        let ok = CommandIndexer::new(&["test".to_string(), "-d".to_string()]).unwrap();
        ok.regenerate(temp_dir.path()).unwrap();

        let missing = temp_dir.path().join("nope");
        let err = ok.regenerate(&missing).unwrap_err();
        assert!(matches!(err, IndexerError::Failed { .. }));
        assert_eq!(ok.name(), "test");
    }
}
