//! Polling Scheduler
//!
//! Drives periodic fetch-diff-dispatch cycles on a dedicated OS thread that
//! hosts a private current-thread Tokio runtime. Blocking fetches and
//! blocking callbacks run on that runtime's bounded blocking pool so the
//! loop itself never stalls.
//!
//! # Design
//!
//! ```text
//! loop until cancelled:
//!   active  = registry.active_snapshot()
//!   groups  = active grouped by polling frequency
//!   for each due group:
//!     values  = fetch_with_retry(union of watched keys)
//!     changes = registry.record_snapshots(values, source.detect)
//!     deliver changes to every still-active member watching the key
//!   sleep(min(default interval, smallest active frequency))
//! ```
//!
//! `stop()` cancels the loop, waits for the thread with a bounded timeout and
//! leaves in-flight blocking work behind. Dropping the scheduler stops it.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use futures::future::join_all;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::registry::{ActiveSubscription, SubscriptionRegistry};
use super::retry::fetch_with_retry;
use super::source::{FetchMode, PollSource};
use super::callback::Callback;
use crate::domain::subscription::SubscriptionId;
use crate::error::SdkError;
use crate::infrastructure::config::SchedulerSettings;
use crate::infrastructure::metrics;

/// Registry type used by a scheduler over source `S`.
pub type RegistryFor<S> = SubscriptionRegistry<
    <S as PollSource>::Key,
    <S as PollSource>::Value,
    <S as PollSource>::Change,
>;

// =============================================================================
// Options
// =============================================================================

/// Tunables of a polling scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Size of the blocking pool for fetches and blocking callbacks.
    pub worker_threads: usize,
    /// Bounded wait for the scheduler thread in `stop()`.
    pub stop_timeout: Duration,
    /// Loop interval when no subscription is active, and upper bound on the
    /// interval otherwise.
    pub default_interval: Duration,
    /// Base time unit of the retry backoff.
    pub retry_unit: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            worker_threads: 10,
            stop_timeout: Duration::from_secs(5),
            default_interval: Duration::from_secs(1),
            retry_unit: Duration::from_secs(1),
        }
    }
}

impl SchedulerOptions {
    /// Create options from loaded settings.
    #[must_use]
    pub const fn from_settings(settings: &SchedulerSettings) -> Self {
        Self {
            worker_threads: settings.worker_threads,
            stop_timeout: settings.stop_timeout,
            default_interval: settings.default_interval,
            retry_unit: settings.retry_unit,
        }
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// Handle on a running scheduler thread.
struct Worker {
    cancel: CancellationToken,
    exited: mpsc::Receiver<()>,
    handle: JoinHandle<()>,
    thread_id: ThreadId,
}

/// Background polling scheduler over a `PollSource`.
pub struct PollingScheduler<S: PollSource> {
    source: Arc<S>,
    registry: Arc<RegistryFor<S>>,
    options: SchedulerOptions,
    worker: Mutex<Option<Worker>>,
}

impl<S: PollSource> PollingScheduler<S> {
    /// Create a stopped scheduler.
    #[must_use]
    pub fn new(source: Arc<S>, registry: Arc<RegistryFor<S>>, options: SchedulerOptions) -> Self {
        Self {
            source,
            registry,
            options,
            worker: Mutex::new(None),
        }
    }

    /// Returns true while the scheduler thread is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    /// Start the scheduler thread. No-op if it is already running.
    pub fn start(&self) -> Result<(), SdkError> {
        let mut slot = self.worker.lock();
        if let Some(worker) = slot.as_ref()
            && !worker.handle.is_finished()
        {
            return Ok(());
        }
        if let Some(stale) = slot.take()
            && stale.handle.join().is_err()
        {
            tracing::error!(source = S::NAME, "Previous scheduler thread panicked");
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .max_blocking_threads(self.options.worker_threads.max(1))
            .thread_name(format!("{}-poll-worker", S::NAME))
            .build()?;

        let cancel = CancellationToken::new();
        let (exit_tx, exited) = mpsc::channel();
        let poll_loop = PollLoop {
            source: Arc::clone(&self.source),
            registry: Arc::clone(&self.registry),
            options: self.options,
            cancel: cancel.clone(),
        };

        let handle = thread::Builder::new()
            .name(format!("{}-scheduler", S::NAME))
            .spawn(move || {
                runtime.block_on(poll_loop.run());
                runtime.shutdown_background();
                let _ = exit_tx.send(());
            })?;

        let thread_id = handle.thread().id();
        *slot = Some(Worker {
            cancel,
            exited,
            handle,
            thread_id,
        });

        tracing::info!(source = S::NAME, "Polling scheduler started");
        Ok(())
    }

    /// Stop the scheduler thread. Safe to call repeatedly.
    ///
    /// Waits at most `stop_timeout` for the thread; outstanding blocking
    /// callbacks are not awaited.
    pub fn stop(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        worker.cancel.cancel();

        // Called from an async callback on the scheduler thread itself.
        if thread::current().id() == worker.thread_id {
            tracing::debug!(source = S::NAME, "Scheduler stopped from its own thread");
            return;
        }

        match worker.exited.recv_timeout(self.options.stop_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.handle.join().is_err() {
                    tracing::error!(source = S::NAME, "Scheduler thread panicked");
                }
                tracing::info!(source = S::NAME, "Polling scheduler stopped");
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    source = S::NAME,
                    timeout_ms = self.options.stop_timeout.as_millis() as u64,
                    "Scheduler thread did not exit in time, detaching"
                );
            }
        }
    }
}

impl<S: PollSource> Drop for PollingScheduler<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

// =============================================================================
// Polling loop
// =============================================================================

/// State moved onto the scheduler thread.
struct PollLoop<S: PollSource> {
    source: Arc<S>,
    registry: Arc<RegistryFor<S>>,
    options: SchedulerOptions,
    cancel: CancellationToken,
}

impl<S: PollSource> PollLoop<S> {
    async fn run(self) {
        tracing::debug!(source = S::NAME, "Polling loop running");
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                () = self.poll_due_groups() => {}
            }

            let pause = self.next_pause();
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(pause) => {}
            }
        }
        tracing::debug!(source = S::NAME, "Polling loop exited");
    }

    fn next_pause(&self) -> Duration {
        let default = self.options.default_interval;
        self.registry
            .min_active_frequency()
            .map_or(default, |frequency| frequency.min(default))
    }

    async fn poll_due_groups(&self) {
        let active = self.registry.active_snapshot();
        metrics::set_active_subscriptions(S::NAME, active.len());
        if active.is_empty() {
            return;
        }

        let mut groups: BTreeMap<Duration, Vec<ActiveSubscription<S::Key, S::Change>>> =
            BTreeMap::new();
        for subscription in active {
            groups
                .entry(subscription.config.polling_frequency())
                .or_default()
                .push(subscription);
        }

        for (frequency, members) in groups {
            let now = Instant::now();
            let due = members.iter().any(|member| {
                member
                    .last_polled
                    .is_none_or(|at| now.saturating_duration_since(at) >= frequency)
            });
            if !due {
                continue;
            }

            self.poll_group(&members).await;
            metrics::record_poll_cycle(S::NAME, now.elapsed());
            self.registry.mark_polled(members.iter().map(|member| member.id), now);
        }
    }

    async fn poll_group(&self, members: &[ActiveSubscription<S::Key, S::Change>]) {
        let mut seen = HashSet::new();
        let keys: Vec<S::Key> = members
            .iter()
            .flat_map(|member| member.watched.iter())
            .filter(|key| seen.insert((*key).clone()))
            .cloned()
            .collect();
        let Some(first) = members.first() else {
            return;
        };
        let config = first.config;
        let unit = self.options.retry_unit;

        let values = match S::FETCH_MODE {
            FetchMode::Batched => fetch_with_retry(&self.source, keys, &config, unit).await,
            FetchMode::PerKey => join_all(
                keys.into_iter()
                    .map(|key| fetch_with_retry(&self.source, vec![key], &config, unit)),
            )
            .await
            .into_iter()
            .flatten()
            .collect(),
        };
        if values.is_empty() {
            return;
        }

        let source = &self.source;
        let changes = self
            .registry
            .record_snapshots(values, |key, old, new| source.detect(key, old, new));
        if changes.is_empty() {
            return;
        }
        metrics::record_changes(S::NAME, changes.len());

        let deliveries = members.iter().filter_map(|member| {
            let pending: Vec<S::Change> = member
                .watched
                .iter()
                .filter_map(|key| changes.get(key).cloned())
                .collect();
            if pending.is_empty() || !self.registry.is_active(member.id) {
                return None;
            }
            Some(deliver::<S>(member.id, member.callback.clone(), pending))
        });
        join_all(deliveries).await;
    }
}

/// Invoke one subscription's callback for each of its changes, in order.
async fn deliver<S: PollSource>(
    id: SubscriptionId,
    callback: Callback<S::Change>,
    changes: Vec<S::Change>,
) {
    for change in changes {
        if let Err(err) = callback.invoke(change).await {
            metrics::record_callback_failure(S::NAME);
            tracing::error!(
                source = S::NAME,
                subscription_id = %id,
                error = %err,
                "Subscription callback failed"
            );
        }
    }
}
