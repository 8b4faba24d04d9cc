//! Subscription Registry
//!
//! Thread-safe bookkeeping of subscriptions, the reverse key index and the
//! shared snapshot cache.
//!
//! # Design
//!
//! All three maps live behind one mutex so every subscribe/unsubscribe
//! updates the registry, the index and the cache in a single critical
//! section. The index doubles as a reference count for cache entries:
//! when the last subscription watching a key goes away, the key's bucket and
//! its cached snapshot are removed together.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::callback::Callback;
use crate::domain::subscription::{
    SubscriptionConfig, SubscriptionId, SubscriptionInfo, SubscriptionStatus,
    validate_polling_frequency,
};
use crate::error::SdkError;

// =============================================================================
// Types
// =============================================================================

/// A registered subscription.
struct Subscription<K, C> {
    /// Registration order; the oldest member of a group supplies its retry config.
    seq: u64,
    watched: Vec<K>,
    callback: Callback<C>,
    config: SubscriptionConfig,
    status: SubscriptionStatus,
    last_polled: Option<Instant>,
}

/// Point-in-time copy of an active subscription, taken by the scheduler.
///
/// Snapshots are ordered oldest first.
pub(crate) struct ActiveSubscription<K, C> {
    pub id: SubscriptionId,
    pub watched: Vec<K>,
    pub callback: Callback<C>,
    pub config: SubscriptionConfig,
    pub last_polled: Option<Instant>,
}

struct RegistryState<K, V, C> {
    subscriptions: HashMap<SubscriptionId, Subscription<K, C>>,
    key_index: HashMap<K, HashSet<SubscriptionId>>,
    snapshots: HashMap<K, V>,
    next_seq: u64,
}

impl<K, V, C> Default for RegistryState<K, V, C> {
    fn default() -> Self {
        Self {
            subscriptions: HashMap::new(),
            key_index: HashMap::new(),
            snapshots: HashMap::new(),
            next_seq: 0,
        }
    }
}

/// Registry of subscriptions keyed by `K`, caching values `V` and
/// delivering changes `C`.
pub struct SubscriptionRegistry<K, V, C> {
    state: Mutex<RegistryState<K, V, C>>,
}

impl<K, V, C> Default for SubscriptionRegistry<K, V, C> {
    fn default() -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
        }
    }
}

impl<K, V, C> SubscriptionRegistry<K, V, C>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Register a subscription watching `watched`.
    ///
    /// Duplicate keys are collapsed, keeping the first occurrence.
    pub fn subscribe(
        &self,
        watched: Vec<K>,
        callback: Callback<C>,
        config: Option<SubscriptionConfig>,
    ) -> Result<SubscriptionId, SdkError> {
        if watched.is_empty() {
            return Err(SdkError::InvalidArgument(
                "subscription must watch at least one key".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(watched.len());
        let watched: Vec<K> = watched
            .into_iter()
            .filter(|key| seen.insert(key.clone()))
            .collect();

        let id = SubscriptionId::generate();
        let mut state = self.state.lock();
        for key in &watched {
            state.key_index.entry(key.clone()).or_default().insert(id);
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.subscriptions.insert(
            id,
            Subscription {
                seq,
                watched,
                callback,
                config: config.unwrap_or_default(),
                status: SubscriptionStatus::Active,
                last_polled: None,
            },
        );
        Ok(id)
    }

    /// Remove a subscription. Returns false if it is unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.state.lock();
        let Some(subscription) = state.subscriptions.remove(&id) else {
            return false;
        };

        for key in &subscription.watched {
            let now_empty = state.key_index.get_mut(key).is_some_and(|bucket| {
                bucket.remove(&id);
                bucket.is_empty()
            });
            if now_empty {
                state.key_index.remove(key);
                state.snapshots.remove(key);
            }
        }
        true
    }

    /// Remove every subscription, index bucket and cached snapshot.
    pub fn unsubscribe_all(&self) {
        let mut state = self.state.lock();
        state.subscriptions.clear();
        state.key_index.clear();
        state.snapshots.clear();
    }

    /// Pause a subscription. Returns false if it is unknown.
    pub fn pause(&self, id: SubscriptionId) -> bool {
        self.set_status(id, SubscriptionStatus::Paused)
    }

    /// Resume a subscription. Returns false if it is unknown.
    pub fn resume(&self, id: SubscriptionId) -> bool {
        self.set_status(id, SubscriptionStatus::Active)
    }

    fn set_status(&self, id: SubscriptionId, status: SubscriptionStatus) -> bool {
        let mut state = self.state.lock();
        match state.subscriptions.get_mut(&id) {
            Some(subscription) => {
                subscription.status = status;
                true
            }
            None => false,
        }
    }

    /// Change a subscription's polling frequency.
    ///
    /// The frequency is validated before the lookup, so an out-of-range value
    /// fails even for unknown ids. Returns `Ok(false)` if the id is unknown.
    pub fn set_frequency(&self, id: SubscriptionId, seconds: f64) -> Result<bool, SdkError> {
        validate_polling_frequency(seconds)?;
        let mut state = self.state.lock();
        match state.subscriptions.get_mut(&id) {
            Some(subscription) => {
                subscription.config.set_polling_frequency(seconds)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Ids of all active (not paused) subscriptions, oldest first.
    #[must_use]
    pub fn active_ids(&self) -> Vec<SubscriptionId> {
        self.active_snapshot()
            .into_iter()
            .map(|subscription| subscription.id)
            .collect()
    }

    /// Bookkeeping snapshot of a subscription, or `None` if it is unknown.
    #[must_use]
    pub fn info(&self, id: SubscriptionId) -> Option<SubscriptionInfo<K>> {
        self.state
            .lock()
            .subscriptions
            .get(&id)
            .map(|subscription| SubscriptionInfo {
                id,
                watched: subscription.watched.clone(),
                status: subscription.status,
                config: subscription.config,
                last_polled: subscription.last_polled,
            })
    }

    /// Number of registered subscriptions, paused ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().subscriptions.len()
    }

    /// Returns true if no subscription is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().subscriptions.is_empty()
    }

    /// Number of keys with at least one watching subscription.
    #[must_use]
    pub fn watched_key_count(&self) -> usize {
        self.state.lock().key_index.len()
    }

    /// Number of subscriptions watching `key`.
    #[must_use]
    pub fn watcher_count(&self, key: &K) -> usize {
        self.state.lock().key_index.get(key).map_or(0, HashSet::len)
    }

    /// Cached snapshot for `key`, if one was observed.
    #[must_use]
    pub fn cached(&self, key: &K) -> Option<V> {
        self.state.lock().snapshots.get(key).cloned()
    }

    // =========================================================================
    // Scheduler hooks
    // =========================================================================

    /// Copy out every active subscription, oldest first.
    pub(crate) fn active_snapshot(&self) -> Vec<ActiveSubscription<K, C>> {
        let state = self.state.lock();
        let mut active: Vec<(u64, ActiveSubscription<K, C>)> = state
            .subscriptions
            .iter()
            .filter(|(_, subscription)| subscription.status == SubscriptionStatus::Active)
            .map(|(id, subscription)| {
                let copy = ActiveSubscription {
                    id: *id,
                    watched: subscription.watched.clone(),
                    callback: subscription.callback.clone(),
                    config: subscription.config,
                    last_polled: subscription.last_polled,
                };
                (subscription.seq, copy)
            })
            .collect();
        drop(state);
        active.sort_unstable_by_key(|(seq, _)| *seq);
        active.into_iter().map(|(_, subscription)| subscription).collect()
    }

    /// Returns true if the subscription exists and is active.
    pub(crate) fn is_active(&self, id: SubscriptionId) -> bool {
        self.state
            .lock()
            .subscriptions
            .get(&id)
            .is_some_and(|subscription| subscription.status == SubscriptionStatus::Active)
    }

    /// Smallest polling frequency among active subscriptions.
    pub(crate) fn min_active_frequency(&self) -> Option<Duration> {
        self.state
            .lock()
            .subscriptions
            .values()
            .filter(|subscription| subscription.status == SubscriptionStatus::Active)
            .map(|subscription| subscription.config.polling_frequency())
            .min()
    }

    /// Record the poll time of the given subscriptions.
    pub(crate) fn mark_polled(&self, ids: impl IntoIterator<Item = SubscriptionId>, at: Instant) {
        let mut state = self.state.lock();
        for id in ids {
            if let Some(subscription) = state.subscriptions.get_mut(&id) {
                subscription.last_polled = Some(at);
            }
        }
    }

    /// Diff fresh values against the cache and update it.
    ///
    /// Each key is diffed once. The first value seen for a key is stored as
    /// the baseline without producing a change. Keys that are no longer
    /// watched by any subscription are dropped rather than cached.
    pub(crate) fn record_snapshots<Ch, F>(
        &self,
        values: Vec<(K, V)>,
        mut detect: F,
    ) -> HashMap<K, Ch>
    where
        F: FnMut(&K, Option<&V>, &V) -> Option<Ch>,
    {
        let mut changes = HashMap::new();
        let mut guard = self.state.lock();
        let state = &mut *guard;
        for (key, value) in values {
            if !state.key_index.contains_key(&key) {
                continue;
            }
            let change = match state.snapshots.get(&key) {
                None => None,
                Some(old) => match detect(&key, Some(old), &value) {
                    Some(change) => Some(change),
                    None => continue,
                },
            };
            state.snapshots.insert(key.clone(), value);
            if let Some(change) = change {
                changes.insert(key, change);
            }
        }
        changes
    }
}
