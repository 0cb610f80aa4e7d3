use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use conda_server::Settings;
use tempfile::TempDir;

#[test]
fn test_env_overrides_file_and_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("conda-server.toml");
    fs::write(
        &config_path,
        r#"
channel_dir = "/from/file"

[locks]
acquire_timeout_secs = 5
poll_interval_ms = 20
"#,
    )
    .unwrap();

    unsafe {
        // Use double underscore to separate nested levels
        env::set_var("CONDA_SERVER_CHANNEL_DIR", "/from/env");
        env::set_var("CONDA_SERVER_LOCKS__ACQUIRE_TIMEOUT_SECS", "0");
        env::set_var("CONDA_SERVER_WATCH__ENABLED", "false");
    }

    let settings = Settings::load(Some(config_path.as_path())).unwrap();

    unsafe {
        env::remove_var("CONDA_SERVER_CHANNEL_DIR");
        env::remove_var("CONDA_SERVER_LOCKS__ACQUIRE_TIMEOUT_SECS");
        env::remove_var("CONDA_SERVER_WATCH__ENABLED");
    }

    // Environment beats the file
    assert_eq!(settings.channel_dir, PathBuf::from("/from/env"));
    assert!(!settings.watch.enabled);
    // File beats the defaults
    assert_eq!(settings.locks.poll_interval_ms, 20);
    // Defaults fill the rest
    assert_eq!(settings.locks.stale_after_secs, 600);

    let options = settings.locks.options();
    assert_eq!(options.timeout, None);
    assert_eq!(options.poll_interval, Duration::from_millis(20));
    assert_eq!(options.stale_after, Some(Duration::from_secs(600)));
}
