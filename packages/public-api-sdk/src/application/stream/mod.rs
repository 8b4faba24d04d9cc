//! Async Price Stream
//!
//! Pull-based alternative to the threaded scheduler for cooperative callers.
//! Instead of callbacks, `stream()` returns a lazy `Stream` of change maps
//! (`symbol -> Quote`) that the caller drives with `.next().await`. No
//! background task is spawned; polling happens only while the caller pulls.
//!
//! # Design
//!
//! Each step of a stream:
//! 1. waits the inter-step interval (skipped before the first fetch)
//! 2. re-reads the subscription's instrument set, ending the stream if the
//!    subscription is gone
//! 3. fetches quotes for the whole set
//! 4. diffs every quote against the cache shared by all streams of this
//!    instance (first observation is a baseline) and yields the changed
//!    symbols, or nothing if no symbol changed
//!
//! Membership and cache live behind one async mutex, which is never held
//! across the fetch.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::Mutex;

use crate::application::ports::{AsyncQuoteFetcher, FetchError};
use crate::domain::instrument::InstrumentRef;
use crate::domain::quote::Quote;
use crate::domain::subscription::SubscriptionId;
use crate::domain::subscription::change::detect_price_change;
use crate::error::SdkError;
use crate::infrastructure::metrics;

const SOURCE: &str = "stream";

/// Handler invoked with fetch errors instead of logging them.
pub type FetchErrorHandler = Arc<dyn Fn(&FetchError) + Send + Sync>;

/// Map of changed symbols to their new quote.
///
/// Keyed by symbol alone: if two watched instruments share a symbol (for
/// example an equity and an option root) and both change in the same step,
/// the one fetched last wins. The cache still tracks both separately.
pub type PriceUpdates = HashMap<String, Quote>;

// =============================================================================
// State
// =============================================================================

#[derive(Default)]
struct StreamState {
    subscriptions: HashMap<SubscriptionId, Vec<InstrumentRef>>,
    last_quotes: HashMap<InstrumentRef, Quote>,
}

impl StreamState {
    fn is_watched(&self, instrument: &InstrumentRef) -> bool {
        self.subscriptions
            .values()
            .any(|instruments| instruments.contains(instrument))
    }

    fn prune_cache(&mut self) {
        let watched: HashSet<&InstrumentRef> = self.subscriptions.values().flatten().collect();
        self.last_quotes.retain(|instrument, _| watched.contains(instrument));
    }

    /// Diff fresh quotes against the cache. `None` if the subscription is gone.
    fn record(&mut self, id: SubscriptionId, quotes: Vec<Quote>) -> Option<PriceUpdates> {
        if !self.subscriptions.contains_key(&id) {
            return None;
        }
        let mut changes = PriceUpdates::new();
        for quote in quotes {
            if !self.is_watched(&quote.instrument) {
                continue;
            }
            let previous = self.last_quotes.get(&quote.instrument);
            let changed = match previous {
                None => false,
                Some(old) => detect_price_change(Some(old), &quote).is_some(),
            };
            if previous.is_none() || changed {
                self.last_quotes.insert(quote.instrument.clone(), quote.clone());
            }
            if changed
                && let Some(replaced) = changes.insert(quote.instrument.symbol.clone(), quote)
            {
                tracing::warn!(
                    subscription_id = %id,
                    symbol = %replaced.instrument.symbol,
                    replaced_type = %replaced.instrument.instrument_type,
                    "Two instruments share a symbol, keeping the later change"
                );
            }
        }
        Some(changes)
    }
}

struct StreamInner {
    fetcher: Arc<dyn AsyncQuoteFetcher>,
    interval: Duration,
    state: Mutex<StreamState>,
}

// =============================================================================
// AsyncPriceStream
// =============================================================================

/// Cooperative price stream over an async quote fetcher.
///
/// Cheap to clone; clones share subscriptions and the quote cache.
#[derive(Clone)]
pub struct AsyncPriceStream {
    inner: Arc<StreamInner>,
}

impl fmt::Debug for AsyncPriceStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncPriceStream")
            .field("interval", &self.inner.interval)
            .finish_non_exhaustive()
    }
}

impl AsyncPriceStream {
    /// Create a stream that waits `interval` between fetches.
    #[must_use]
    pub fn new(fetcher: Arc<dyn AsyncQuoteFetcher>, interval: Duration) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                fetcher,
                interval,
                state: Mutex::new(StreamState::default()),
            }),
        }
    }

    /// Register an instrument set. Does not start polling.
    pub async fn subscribe(
        &self,
        instruments: Vec<InstrumentRef>,
    ) -> Result<SubscriptionId, SdkError> {
        let instruments = normalize(instruments)?;
        let id = SubscriptionId::generate();
        self.inner.state.lock().await.subscriptions.insert(id, instruments);
        tracing::debug!(subscription_id = %id, "Stream subscription registered");
        Ok(id)
    }

    /// Replace a subscription's instrument set. The next step of its stream
    /// uses the new set. Returns `Ok(false)` if the subscription is unknown.
    pub async fn update_instruments(
        &self,
        id: SubscriptionId,
        instruments: Vec<InstrumentRef>,
    ) -> Result<bool, SdkError> {
        let instruments = normalize(instruments)?;
        let mut state = self.inner.state.lock().await;
        let Some(current) = state.subscriptions.get_mut(&id) else {
            return Ok(false);
        };
        *current = instruments;
        state.prune_cache();
        Ok(true)
    }

    /// Remove a subscription. Its stream ends at the next step.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.inner.state.lock().await;
        if state.subscriptions.remove(&id).is_none() {
            return false;
        }
        state.prune_cache();
        true
    }

    /// Remove every subscription and clear the cache.
    pub async fn unsubscribe_all(&self) {
        let mut state = self.inner.state.lock().await;
        state.subscriptions.clear();
        state.last_quotes.clear();
    }

    /// Ids of all registered subscriptions.
    pub async fn get_active_subscriptions(&self) -> Vec<SubscriptionId> {
        self.inner.state.lock().await.subscriptions.keys().copied().collect()
    }

    /// Cached quote for `instrument`, if one has been observed.
    pub async fn cached_quote(&self, instrument: &InstrumentRef) -> Option<Quote> {
        self.inner.state.lock().await.last_quotes.get(instrument).cloned()
    }

    /// Lazy stream of price changes for a subscription.
    ///
    /// Fails with `UnknownSubscription` if the id is not registered. Fetch
    /// errors never end the stream: they go to `on_error` when given and are
    /// logged otherwise.
    pub async fn stream(
        &self,
        id: SubscriptionId,
        on_error: Option<FetchErrorHandler>,
    ) -> Result<BoxStream<'static, PriceUpdates>, SdkError> {
        if !self.inner.state.lock().await.subscriptions.contains_key(&id) {
            return Err(SdkError::UnknownSubscription(id));
        }

        let step = Step {
            inner: Arc::clone(&self.inner),
            id,
            on_error,
            started: false,
        };
        Ok(futures::stream::unfold(step, Step::next).boxed())
    }
}

/// Reject empty sets and collapse duplicates, keeping order.
fn normalize(instruments: Vec<InstrumentRef>) -> Result<Vec<InstrumentRef>, SdkError> {
    if instruments.is_empty() {
        return Err(SdkError::InvalidArgument(
            "instruments must contain at least one item".to_string(),
        ));
    }
    let mut seen = HashSet::with_capacity(instruments.len());
    Ok(instruments
        .into_iter()
        .filter(|instrument| seen.insert(instrument.clone()))
        .collect())
}

// =============================================================================
// Stream steps
// =============================================================================

struct Step {
    inner: Arc<StreamInner>,
    id: SubscriptionId,
    on_error: Option<FetchErrorHandler>,
    started: bool,
}

impl Step {
    async fn next(mut self) -> Option<(PriceUpdates, Self)> {
        loop {
            if self.started {
                tokio::time::sleep(self.inner.interval).await;
            }
            self.started = true;

            let instruments = self
                .inner
                .state
                .lock()
                .await
                .subscriptions
                .get(&self.id)
                .cloned()?;

            match self.inner.fetcher.fetch_quotes(&instruments).await {
                Ok(quotes) => {
                    let changes = self.inner.state.lock().await.record(self.id, quotes)?;
                    if !changes.is_empty() {
                        metrics::record_changes(SOURCE, changes.len());
                        return Some((changes, self));
                    }
                }
                Err(err) => {
                    metrics::record_fetch_failure(SOURCE, err.is_transient());
                    match &self.on_error {
                        Some(handler) => handler(&err),
                        None => tracing::warn!(
                            subscription_id = %self.id,
                            error = %err,
                            "Error fetching quotes for price stream"
                        ),
                    }
                }
            }
        }
    }
}
