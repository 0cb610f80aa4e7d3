//! Coalescing scheduler for index regeneration.
//!
//! ```text
//!            request()                 request()
//!   Idle ─────────────▶ Executing ─────────────▶ ExecutingWithPending
//!    ▲                     │  ▲                          │      │ request()
//!    │     run finished    │  │   run finished,          │      └──▶ dropped
//!    └─────────────────────┘  └── pending takes over ────┘
//! ```
//!
//! Both flags are lock files on the channel root, so every coordinator that
//! shares the directory, in this process or another, follows the same
//! state machine and at most one regeneration runs at a time.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::RecvTimeoutError;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::error::CoordinatorError;
use super::indexer::Indexer;
use crate::lock::{LockGuard, LockOptions};

/// Lock file marking a regeneration in progress.
pub const EXECUTING_LOCK_NAME: &str = ".index_generation.lock";
/// Lock file marking a queued follow-up regeneration.
pub const PENDING_LOCK_NAME: &str = ".pending_index_generation.lock";

/// Scheduler state as recorded on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Executing,
    /// A follow-up run is queued behind the current one (or about to take
    /// over from a run that just finished).
    ExecutingWithPending,
}

/// What a call to [`IndexCoordinator::request`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduled {
    /// A regeneration started immediately.
    Started,
    /// A follow-up was queued behind the running regeneration.
    Queued,
    /// A follow-up was already queued; this request is covered by it.
    Coalesced,
    /// The coordinator is shutting down.
    Stopped,
}

/// Counters since construction, for this coordinator only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub started: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub queued: u64,
    pub coalesced: u64,
}

#[derive(Debug, Default)]
struct Counters {
    started: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    queued: AtomicU64,
    coalesced: AtomicU64,
}

enum Claim {
    Executing(LockGuard),
    Pending(LockGuard),
}

struct Inner {
    channel_root: PathBuf,
    executing_path: PathBuf,
    pending_path: PathBuf,
    indexer: Arc<dyn Indexer>,
    lock_options: LockOptions,
    shutdown: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Counters,
}

/// Drives the external [`Indexer`] for one channel root.
///
/// Cheap to clone; clones share state. Call [`shutdown`](Self::shutdown)
/// before exit to let an in-flight run finish.
#[derive(Clone)]
pub struct IndexCoordinator {
    inner: Arc<Inner>,
}

impl IndexCoordinator {
    pub fn new(
        channel_root: impl Into<PathBuf>,
        indexer: Arc<dyn Indexer>,
        lock_options: LockOptions,
    ) -> Result<Self, CoordinatorError> {
        let channel_root = channel_root.into();
        if !channel_root.is_dir() {
            return Err(CoordinatorError::InvalidRoot { path: channel_root });
        }

        Ok(Self {
            inner: Arc::new(Inner {
                executing_path: channel_root.join(EXECUTING_LOCK_NAME),
                pending_path: channel_root.join(PENDING_LOCK_NAME),
                channel_root,
                indexer,
                lock_options,
                shutdown: CancellationToken::new(),
                workers: Mutex::new(Vec::new()),
                counters: Counters::default(),
            }),
        })
    }

    pub fn channel_root(&self) -> &Path {
        &self.inner.channel_root
    }

    /// Current state, read from the lock files. Claims left behind by a
    /// dead holder do not count.
    pub fn state(&self) -> CoordinatorState {
        let options = &self.inner.lock_options;
        let executing = LockGuard::is_held(&self.inner.executing_path, options);
        let pending = LockGuard::is_held(&self.inner.pending_path, options);
        match (executing, pending) {
            (_, true) => CoordinatorState::ExecutingWithPending,
            (true, false) => CoordinatorState::Executing,
            (false, false) => CoordinatorState::Idle,
        }
    }

    pub fn stats(&self) -> CoordinatorStats {
        let c = &self.inner.counters;
        CoordinatorStats {
            started: c.started.load(Ordering::Relaxed),
            succeeded: c.succeeded.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            queued: c.queued.load(Ordering::Relaxed),
            coalesced: c.coalesced.load(Ordering::Relaxed),
        }
    }

    /// Ask for the index to be regenerated.
    ///
    /// Returns as soon as the decision is made; the regeneration itself runs
    /// on a worker thread.
    pub fn request(&self) -> Result<Scheduled, CoordinatorError> {
        let inner = &self.inner;
        if inner.shutdown.is_cancelled() {
            return Ok(Scheduled::Stopped);
        }

        if LockGuard::is_held(&inner.pending_path, &inner.lock_options) {
            inner.counters.coalesced.fetch_add(1, Ordering::Relaxed);
            crate::debug_event!("index", "coalesced");
            return Ok(Scheduled::Coalesced);
        }

        if let Some(executing) = LockGuard::try_acquire(&inner.executing_path, &inner.lock_options)? {
            inner.clear_stale_pending();
            self.spawn_worker(Claim::Executing(executing))?;
            return Ok(Scheduled::Started);
        }

        match LockGuard::try_acquire(&inner.pending_path, &inner.lock_options)? {
            Some(pending) => {
                inner.counters.queued.fetch_add(1, Ordering::Relaxed);
                crate::log_event!("index", "queued", "follow-up after current run");
                self.spawn_worker(Claim::Pending(pending))?;
                Ok(Scheduled::Queued)
            }
            None => {
                inner.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                crate::debug_event!("index", "coalesced");
                Ok(Scheduled::Coalesced)
            }
        }
    }

    /// Block until every run this coordinator started or queued is done.
    pub fn wait_idle(&self) {
        loop {
            let workers = std::mem::take(&mut *self.inner.workers.lock());
            if workers.is_empty() {
                return;
            }
            for worker in workers {
                if worker.join().is_err() {
                    tracing::error!("[index] worker thread panicked");
                }
            }
        }
    }

    /// Stop scheduling. A queued follow-up is abandoned and its claim
    /// released; an in-flight run is allowed to finish.
    pub fn shutdown(&self) {
        if !self.inner.shutdown.is_cancelled() {
            crate::log_event!("index", "shutting down");
            self.inner.shutdown.cancel();
        }
        self.wait_idle();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    fn spawn_worker(&self, claim: Claim) -> Result<(), CoordinatorError> {
        let inner = Arc::clone(&self.inner);
        let handle = thread::Builder::new()
            .name("index-worker".to_string())
            .spawn(move || inner.run(claim))
            .map_err(CoordinatorError::Spawn)?;

        let mut workers = self.inner.workers.lock();
        workers.retain(|worker| !worker.is_finished());
        workers.push(handle);
        Ok(())
    }
}

impl Inner {
    /// Remove a pending claim whose holder died. The run about to start
    /// covers whatever it was queued for.
    fn clear_stale_pending(&self) {
        if !LockGuard::is_locked(&self.pending_path)
            || LockGuard::is_held(&self.pending_path, &self.lock_options)
        {
            return;
        }
        match LockGuard::try_acquire(&self.pending_path, &self.lock_options) {
            Ok(Some(stale)) => {
                if let Err(e) = stale.release() {
                    tracing::warn!("[index] failed to clear stale pending claim: {e}");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("[index] cannot reclaim stale pending claim: {e}"),
        }
    }

    fn run(&self, claim: Claim) {
        let executing = match claim {
            Claim::Executing(executing) => executing,
            Claim::Pending(pending) => match self.take_over(pending) {
                Some(executing) => executing,
                None => return,
            },
        };
        self.execute(executing);
    }

    /// Wait for the running regeneration to finish, then claim execution
    /// and clear the pending flag so later changes can queue again.
    fn take_over(&self, pending: LockGuard) -> Option<LockGuard> {
        let heartbeat = self.lock_options.heartbeat_interval();
        let mut last_beat = Instant::now();

        loop {
            if self.shutdown.is_cancelled() {
                crate::log_event!("index", "dropped", "queued run abandoned on shutdown");
                return None;
            }

            match LockGuard::try_acquire(&self.executing_path, &self.lock_options) {
                Ok(Some(executing)) => {
                    if let Err(e) = pending.release() {
                        tracing::warn!("[index] failed to clear pending claim: {e}");
                    }
                    return Some(executing);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("[index] cannot claim execution: {e}");
                    return None;
                }
            }

            if last_beat.elapsed() >= heartbeat {
                if let Err(e) = pending.refresh() {
                    tracing::warn!("[index] failed to refresh pending claim: {e}");
                }
                last_beat = Instant::now();
            }
            thread::sleep(self.lock_options.poll_interval);
        }
    }

    fn execute(&self, executing: LockGuard) {
        self.counters.started.fetch_add(1, Ordering::Relaxed);
        crate::log_event!("index", "started", "{}", self.channel_root.display());

        let started = Instant::now();
        let heartbeat = self.lock_options.heartbeat_interval();
        let outcome = thread::scope(|scope| {
            let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);
            let claim = &executing;
            scope.spawn(move || {
                while let Err(RecvTimeoutError::Timeout) = done_rx.recv_timeout(heartbeat) {
                    if let Err(e) = claim.refresh() {
                        tracing::warn!("[index] failed to refresh execution claim: {e}");
                    }
                }
            });

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                self.indexer.regenerate(&self.channel_root)
            }));
            drop(done_tx);
            outcome
        });

        let name = self.indexer.name();
        match outcome {
            Ok(Ok(())) => {
                self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
                crate::log_event!("index", "regenerated", "{name} in {:.2?}", started.elapsed());
            }
            Ok(Err(e)) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!("[index] {name} failed: {e}");
            }
            Err(_) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!("[index] {name} panicked");
            }
        }

        if let Err(e) = executing.release() {
            tracing::warn!("[index] failed to clear execution claim: {e}");
        }
    }
}
