//! Poll sources.
//!
//! A `PollSource` tells the generic scheduler how to fetch fresh values for a
//! set of watch-keys and how to diff a fresh value against the cached one.
//! Price and order tracking are the two instantiations.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::application::ports::{FetchError, OrderGateway, QuoteFetcher};
use crate::domain::instrument::InstrumentRef;
use crate::domain::order::{Order, OrderRef};
use crate::domain::quote::Quote;
use crate::domain::subscription::change::{
    OrderUpdate, PriceChange, detect_order_change, detect_price_change,
};

/// How the scheduler issues fetches for a frequency group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// One deduplicated fetch for every key in the group.
    Batched,
    /// One fetch per key; a failing key does not hide the others.
    PerKey,
}

/// Fetch-and-diff strategy driven by the polling scheduler.
pub trait PollSource: Send + Sync + 'static {
    /// Watch-key (instrument or order identity).
    type Key: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;
    /// Cached snapshot value.
    type Value: Clone + Send + Sync + 'static;
    /// Change record handed to callbacks.
    type Change: Clone + Send + 'static;

    /// Label used in logs and metrics.
    const NAME: &'static str;

    /// Fetch strategy for a frequency group.
    const FETCH_MODE: FetchMode;

    /// Fetch fresh values for `keys`. Runs on a blocking worker thread.
    ///
    /// Keys missing from the response are simply absent from the result.
    fn fetch(&self, keys: &[Self::Key]) -> Result<Vec<(Self::Key, Self::Value)>, FetchError>;

    /// Diff a fresh value against the cached snapshot of the same key.
    fn detect(
        &self,
        key: &Self::Key,
        old: Option<&Self::Value>,
        new: &Self::Value,
    ) -> Option<Self::Change>;
}

// =============================================================================
// Quotes
// =============================================================================

/// Quote polling over a batched `QuoteFetcher`.
#[derive(Clone)]
pub struct PriceSource {
    fetcher: Arc<dyn QuoteFetcher>,
}

impl PriceSource {
    /// Create a price source.
    #[must_use]
    pub fn new(fetcher: Arc<dyn QuoteFetcher>) -> Self {
        Self { fetcher }
    }
}

impl fmt::Debug for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriceSource").finish_non_exhaustive()
    }
}

impl PollSource for PriceSource {
    type Key = InstrumentRef;
    type Value = Quote;
    type Change = PriceChange;

    const NAME: &'static str = "quotes";
    const FETCH_MODE: FetchMode = FetchMode::Batched;

    fn fetch(&self, keys: &[InstrumentRef]) -> Result<Vec<(InstrumentRef, Quote)>, FetchError> {
        let quotes = self.fetcher.fetch_quotes(keys)?;
        Ok(quotes
            .into_iter()
            .map(|quote| (quote.instrument.clone(), quote))
            .collect())
    }

    fn detect(
        &self,
        _key: &InstrumentRef,
        old: Option<&Quote>,
        new: &Quote,
    ) -> Option<PriceChange> {
        detect_price_change(old, new)
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Order status polling over an `OrderGateway`, one request per order.
#[derive(Clone)]
pub struct OrderSource {
    gateway: Arc<dyn OrderGateway>,
}

impl OrderSource {
    /// Create an order source.
    #[must_use]
    pub fn new(gateway: Arc<dyn OrderGateway>) -> Self {
        Self { gateway }
    }
}

impl fmt::Debug for OrderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderSource").finish_non_exhaustive()
    }
}

impl PollSource for OrderSource {
    type Key = OrderRef;
    type Value = Order;
    type Change = OrderUpdate;

    const NAME: &'static str = "orders";
    const FETCH_MODE: FetchMode = FetchMode::PerKey;

    fn fetch(&self, keys: &[OrderRef]) -> Result<Vec<(OrderRef, Order)>, FetchError> {
        keys.iter()
            .map(|key| {
                let order = self.gateway.fetch_order(&key.order_id, &key.account_id)?;
                Ok((key.clone(), order))
            })
            .collect()
    }

    fn detect(&self, key: &OrderRef, old: Option<&Order>, new: &Order) -> Option<OrderUpdate> {
        detect_order_change(&key.account_id, old, new)
    }
}
