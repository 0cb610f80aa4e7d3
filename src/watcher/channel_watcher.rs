//! Watches a channel tree and turns relevant changes into index requests.

use std::path::{Path, PathBuf};

use notify::{Event, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::index::IndexCoordinator;

use super::debouncer::Debouncer;
use super::error::WatchError;
use super::event::ChangeEvent;
use super::filter::ChangeFilter;

/// Recursive watcher over one channel root.
///
/// Every accepted change is folded into the current batch; once the batch is
/// ready the coordinator gets a single [`IndexCoordinator::request`].
pub struct ChannelWatcher {
    /// Canonical channel root.
    root: PathBuf,
    /// Drops the indexer's own output.
    filter: ChangeFilter,
    /// Batches accepted changes.
    debouncer: Debouncer,
    /// Receives index requests.
    coordinator: IndexCoordinator,
    /// Channel for receiving file events.
    event_rx: mpsc::Receiver<notify::Result<Event>>,
    /// The underlying file watcher.
    _watcher: notify::RecommendedWatcher,
    /// How often the debouncer is polled.
    tick: Duration,
}

impl ChannelWatcher {
    /// Create a builder for configuring the watcher.
    pub fn builder() -> ChannelWatcherBuilder {
        ChannelWatcherBuilder::new()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run until `cancel` fires.
    ///
    /// Returns [`WatchError::ChannelClosed`] if the event source goes away,
    /// which means changes are no longer being observed.
    pub async fn watch(mut self, cancel: CancellationToken) -> Result<(), WatchError> {
        crate::log_event!("watcher", "started", "{}", self.root.display());

        // Created once so a steady event stream cannot keep resetting it.
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    if self.debouncer.has_pending() {
                        tracing::warn!(
                            "[watcher] stopping with {} unindexed changes",
                            self.debouncer.pending_count()
                        );
                    }
                    crate::log_event!("watcher", "stopped");
                    return Ok(());
                }

                res = self.event_rx.recv() => match res {
                    Some(Ok(event)) => self.handle_event(event),
                    Some(Err(e)) => {
                        // Events may have been lost; assume something changed.
                        tracing::error!("[watcher] file watch error: {e}");
                        self.debouncer.record();
                    }
                    None => {
                        tracing::error!("[watcher] event channel closed");
                        return Err(WatchError::ChannelClosed);
                    }
                },

                _ = ticker.tick() => {
                    if let Some(batch) = self.debouncer.take_ready() {
                        // Detached; the coordinator tracks the run itself.
                        drop(self.dispatch(batch));
                    }
                }
            }
        }
    }

    /// Run [`watch`](Self::watch) on the current tokio runtime.
    pub fn spawn(self) -> WatchHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.watch(cancel.clone()));
        WatchHandle {
            cancel,
            task: Some(task),
        }
    }

    fn handle_event(&mut self, event: Event) {
        if event.need_rescan() {
            tracing::warn!("[watcher] backend dropped events, scheduling reindex");
            self.debouncer.record();
            return;
        }

        for change in ChangeEvent::from_notify(&event) {
            if self.filter.accept(&change) {
                crate::debug_event!(
                    "watcher",
                    "change",
                    "{:?} {}",
                    change.kind,
                    change.path.display()
                );
                self.debouncer.record();
            } else {
                tracing::trace!(
                    "[watcher] ignored {:?} {}",
                    change.kind,
                    change.path.display()
                );
            }
        }
    }

    /// Hand a ready batch to the coordinator.
    ///
    /// `request` touches lock files and may reclaim stale ones, so it runs
    /// on the blocking pool instead of the event loop.
    fn dispatch(&self, batch: usize) -> JoinHandle<()> {
        let coordinator = self.coordinator.clone();
        tokio::task::spawn_blocking(move || match coordinator.request() {
            Ok(scheduled) => {
                crate::debug_event!("watcher", "batch", "{batch} changes, {scheduled:?}");
            }
            Err(e) => tracing::error!("[watcher] index request failed: {e}"),
        })
    }
}

/// Owner of a spawned watcher task.
///
/// Dropping the handle cancels the task without waiting for it.
pub struct WatchHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<Result<(), WatchError>>>,
}

impl WatchHandle {
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }

    /// Wait for the task to end on its own.
    ///
    /// Only an error ends it without cancellation, so this is meant to be
    /// raced against a shutdown signal.
    pub async fn finished(&mut self) -> Result<(), WatchError> {
        let Some(task) = self.task.as_mut() else {
            return Ok(());
        };
        let result = task.await;
        self.task = None;
        flatten(result)
    }

    /// Cancel the task and wait for it to exit.
    pub async fn stop(mut self) -> Result<(), WatchError> {
        self.cancel.cancel();
        match self.task.take() {
            Some(task) => flatten(task.await),
            None => Ok(()),
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn flatten(
    result: Result<Result<(), WatchError>, tokio::task::JoinError>,
) -> Result<(), WatchError> {
    result.map_err(|e| WatchError::TaskFailed {
        reason: e.to_string(),
    })?
}

/// Builder for constructing a ChannelWatcher.
pub struct ChannelWatcherBuilder {
    coordinator: Option<IndexCoordinator>,
    debounce_ms: u64,
    max_delay_ms: u64,
    tick_ms: u64,
}

impl ChannelWatcherBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            coordinator: None,
            debounce_ms: 500,
            max_delay_ms: 5000,
            tick_ms: 100,
        }
    }

    /// Coordinator to notify. Its channel root is the watched tree.
    pub fn coordinator(mut self, coordinator: IndexCoordinator) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    /// Quiet period before a batch fires.
    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Longest a batch may be held back by continuous changes.
    pub fn max_delay_ms(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    pub fn tick_ms(mut self, ms: u64) -> Self {
        self.tick_ms = ms;
        self
    }

    /// Build the ChannelWatcher and start observing the tree.
    pub fn build(self) -> Result<ChannelWatcher, WatchError> {
        let coordinator = self.coordinator.ok_or_else(|| WatchError::InitFailed {
            reason: "Coordinator is required".to_string(),
        })?;

        let root = coordinator
            .channel_root()
            .canonicalize()
            .map_err(|e| WatchError::PathWatchFailed {
                path: coordinator.channel_root().to_path_buf(),
                reason: e.to_string(),
            })?;

        // Create channel for events
        let (tx, rx) = mpsc::channel(100);

        // Create the notify watcher
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.blocking_send(res);
        })?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: root.clone(),
                reason: e.to_string(),
            })?;

        Ok(ChannelWatcher {
            filter: ChangeFilter::new(root.clone()),
            debouncer: Debouncer::with_max_delay(self.debounce_ms, self.max_delay_ms),
            coordinator,
            event_rx: rx,
            _watcher: watcher,
            tick: Duration::from_millis(self.tick_ms.max(1)),
            root,
        })
    }
}

impl Default for ChannelWatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
