//! Logging for the server and CLI.
//!
//! Every line carries a compact local timestamp, the level and the module
//! target. Events from this crate are written as `[component] event: detail`
//! through [`log_event!`](crate::log_event) and
//! [`debug_event!`](crate::debug_event). The components are:
//!
//! | component | target                   | info and above           | debug                       |
//! |-----------|--------------------------|--------------------------|-----------------------------|
//! | `lock`    | `conda_server::lock`     | stale locks reclaimed    | waits and releases          |
//! | `atomic`  | `conda_server::atomic`   |                          | commits and aborts          |
//! | `index`   | `conda_server::index`    | runs started, queued     | coalesced requests          |
//! | `watcher` | `conda_server::watcher`  | started, stopped         | accepted changes, batches   |
//! | `channel` | `conda_server::channel`  | uploads and deletes      |                             |
//!
//! # Configuration
//!
//! Module keys are either a component name or a full target path:
//!
//! ```toml
//! [logging]
//! default = "info"
//!
//! [logging.modules]
//! watcher = "debug"            # conda_server::watcher
//! "notify::inotify" = "warn"
//! ```
//!
//! `RUST_LOG` replaces the section entirely:
//! ```bash
//! RUST_LOG=conda_server::index=trace conda-server index
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Install the global subscriber. Only the first call has an effect.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(filter_directives(config))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}

/// `EnvFilter` directives for `config`, overrides sorted by target.
fn filter_directives(config: &LoggingConfig) -> String {
    let mut overrides: Vec<String> = config
        .modules
        .iter()
        .map(|(module, level)| format!("{}={level}", module_target(module)))
        .collect();
    overrides.sort();

    let mut directives = config.default.clone();
    for directive in overrides {
        directives.push(',');
        directives.push_str(&directive);
    }
    directives
}

const COMPONENTS: &[&str] = &["atomic", "channel", "cli", "index", "lock", "watcher"];

/// Component names refer to this crate's modules; anything else is a target.
fn module_target(module: &str) -> String {
    if COMPONENTS.contains(&module) {
        format!("{}::{module}", env!("CARGO_CRATE_NAME"))
    } else {
        module.to_string()
    }
}

/// Log an event with component context.
///
/// # Examples
/// ```ignore
/// log_event!("channel", "uploaded", "{platform}/{name}");
/// log_event!("watcher", "stopped");
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:expr, $event:expr) => {
        tracing::info!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

/// Debug-level counterpart of [`log_event!`](crate::log_event).
///
/// ```ignore
/// debug_event!("watcher", "batch", "{count} changes");
/// ```
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_only() {
        let config = LoggingConfig {
            default: "warn".to_string(),
            modules: HashMap::new(),
        };
        assert_eq!(filter_directives(&config), "warn");
    }

    #[test]
    fn test_component_names_expand_to_crate_targets() {
        let config = LoggingConfig {
            default: "info".to_string(),
            modules: HashMap::from([
                ("watcher".to_string(), "debug".to_string()),
                ("notify::inotify".to_string(), "warn".to_string()),
                ("index".to_string(), "trace".to_string()),
                ("tokio".to_string(), "warn".to_string()),
            ]),
        };
        assert_eq!(
            filter_directives(&config),
            "info,conda_server::index=trace,conda_server::watcher=debug,notify::inotify=warn,tokio=warn"
        );
        assert!(EnvFilter::try_new(filter_directives(&config)).is_ok());
    }
}
