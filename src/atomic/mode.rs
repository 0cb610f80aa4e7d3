//! Write modes accepted by the atomic writer.

use std::fmt;
use std::str::FromStr;

use super::error::AtomicWriteError;

/// How the staging file is seeded from the current target content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Start from an empty file.
    #[default]
    Overwrite,
    /// Start from a copy of the target, cursor at the beginning.
    Update,
    /// Start from a copy of the target, cursor at the end.
    Append,
}

impl WriteMode {
    pub(crate) fn copies_existing(self) -> bool {
        !matches!(self, WriteMode::Overwrite)
    }

    pub(crate) fn rewinds(self) -> bool {
        matches!(self, WriteMode::Update)
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriteMode::Overwrite => "overwrite",
            WriteMode::Update => "update",
            WriteMode::Append => "append",
        };
        f.write_str(name)
    }
}

/// Accepts `overwrite`/`update`/`append` as well as fopen-style strings
/// (`w`, `wb`, `w+`, `r+`, `rb+`, `a`, `ab+`, ...).
impl FromStr for WriteMode {
    type Err = AtomicWriteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "overwrite" => return Ok(WriteMode::Overwrite),
            "update" => return Ok(WriteMode::Update),
            "append" => return Ok(WriteMode::Append),
            "read" => return Err(AtomicWriteError::ReadOnlyMode(s.to_string())),
            _ => {}
        }

        // Binary/text flags do not matter for a byte-oriented writer.
        let flags: String = s.chars().filter(|c| !matches!(c, 'b' | 't')).collect();
        let plus = flags.matches('+').count();
        let letters: String = flags.chars().filter(|c| *c != '+').collect();

        match (letters.as_str(), plus) {
            ("w", 0 | 1) => Ok(WriteMode::Overwrite),
            ("a", 0 | 1) => Ok(WriteMode::Append),
            ("r", 1) => Ok(WriteMode::Update),
            ("r", 0) => Err(AtomicWriteError::ReadOnlyMode(s.to_string())),
            _ => Err(AtomicWriteError::UnknownMode(s.to_string())),
        }
    }
}
