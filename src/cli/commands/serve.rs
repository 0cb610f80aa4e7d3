//! Serve command - keep the channel index current until Ctrl-C.

use anyhow::Context;

use crate::config::Settings;
use crate::watcher::ChannelWatcher;

use super::{coordinator_for, open_channel};

/// Arguments for the serve command.
pub struct ServeArgs {
    pub no_initial_index: bool,
    pub no_watch: bool,
}

/// Run the serve command.
pub async fn run(args: ServeArgs, settings: &Settings) -> anyhow::Result<()> {
    let channel = open_channel(settings)?;
    let coordinator = coordinator_for(settings, &channel)?;
    crate::log_event!("serve", "channel", "{}", channel.root().display());

    if !args.no_initial_index {
        let scheduled = coordinator.request()?;
        crate::debug_event!("serve", "initial index", "{scheduled:?}");
    }

    let mut watch = if settings.watch.enabled && !args.no_watch {
        let watcher = ChannelWatcher::builder()
            .coordinator(coordinator.clone())
            .debounce_ms(settings.watch.debounce_ms)
            .max_delay_ms(settings.watch.max_delay_ms)
            .tick_ms(settings.watch.tick_ms)
            .build()
            .context("cannot watch channel directory")?;
        tracing::debug!(
            "[serve] watching with {}ms debounce",
            settings.watch.debounce_ms
        );
        Some(watcher.spawn())
    } else {
        tracing::info!("[serve] file watching disabled");
        None
    };

    // Runs until Ctrl-C, or until the watcher dies on its own.
    let outcome = match watch.as_mut() {
        Some(handle) => tokio::select! {
            signal = tokio::signal::ctrl_c() => signal.context("cannot listen for Ctrl-C"),
            res = handle.finished() => res.context("channel watcher stopped"),
        },
        None => tokio::signal::ctrl_c()
            .await
            .context("cannot listen for Ctrl-C"),
    };

    crate::log_event!("serve", "shutting down");
    if let Some(handle) = watch {
        if let Err(e) = handle.stop().await {
            tracing::warn!("[serve] watcher did not stop cleanly: {e}");
        }
    }

    // Lets an in-flight index run finish; blocks, so off the runtime.
    let shutdown = coordinator.clone();
    tokio::task::spawn_blocking(move || shutdown.shutdown())
        .await
        .context("coordinator shutdown panicked")?;

    let stats = coordinator.stats();
    crate::log_event!(
        "serve",
        "stopped",
        "{} index runs, {} failed, {} requests coalesced",
        stats.started,
        stats.failed,
        stats.coalesced
    );
    outcome
}
