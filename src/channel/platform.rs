//! Platform subdirectories and package file names.

use std::path::{Component, Path};

/// Platform subdirectories a channel may contain.
pub const PLATFORMS: &[&str] = &[
    "linux-32",
    "linux-64",
    "linux-aarch64",
    "linux-armv6l",
    "linux-armv7l",
    "linux-ppc64",
    "linux-ppc64le",
    "linux-s390x",
    "noarch",
    "osx-64",
    "osx-arm64",
    "win-32",
    "win-64",
    "win-arm64",
    "zos-z",
];

/// Always present in a channel.
pub const NOARCH: &str = "noarch";

pub const PACKAGE_EXTENSIONS: &[&str] = &[".conda", ".tar.bz2"];

pub fn is_platform(name: &str) -> bool {
    PLATFORMS.contains(&name)
}

/// A bare `*.conda` or `*.tar.bz2` file name.
///
/// Anything with a directory part, or hidden, is refused so a name can never
/// reach outside its platform directory or collide with staging files.
pub fn is_package_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single || name.starts_with('.') || name.contains(['/', '\\']) {
        return false;
    }

    PACKAGE_EXTENSIONS
        .iter()
        .any(|ext| name.len() > ext.len() && name.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platforms() {
        assert!(is_platform("noarch"));
        assert!(is_platform("linux-64"));
        assert!(is_platform("zos-z"));
        assert!(!is_platform("linux"));
        assert!(!is_platform("packages"));
        assert_eq!(PLATFORMS.len(), 15);
    }

    #[test]
    fn test_package_file_names() {
        assert!(is_package_file_name("numpy-1.26.0-py311h0_0.conda"));
        assert!(is_package_file_name("zlib-1.2.13-h0_0.tar.bz2"));

        assert!(!is_package_file_name(".conda"));
        assert!(!is_package_file_name(".hidden-1.0-0.conda"));
        assert!(!is_package_file_name("numpy-1.26.0.zip"));
        assert!(!is_package_file_name("../linux-64/a-1.0-0.conda"));
        assert!(!is_package_file_name("noarch/a-1.0-0.conda"));
        assert!(!is_package_file_name("..\\a-1.0-0.conda"));
        assert!(!is_package_file_name(""));
    }
}
