//! Common utilities shared across modules.

use std::path::Path;

use chrono::Utc;

/// Current UTC time as an RFC 3339 string.
pub fn utc_now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Directory containing `path`, `.` for bare file names.
pub fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utc_now_rfc3339() {
        let now = utc_now_rfc3339();
        let parsed = chrono::DateTime::parse_from_rfc3339(&now).unwrap();
        // Should be a reasonable timestamp (after 2020)
        assert!(parsed.timestamp() > 1577836800);
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir(Path::new("a/b.txt")), Path::new("a"));
        assert_eq!(parent_dir(Path::new("b.txt")), Path::new("."));
        assert_eq!(parent_dir(Path::new("/b.txt")), Path::new("/"));
    }
}
