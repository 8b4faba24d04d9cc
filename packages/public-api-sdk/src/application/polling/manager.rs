//! Subscription managers.
//!
//! A `SubscriptionManager` pairs a registry with its polling scheduler and is
//! the public face of the threaded subscription engine. The first successful
//! `subscribe` starts the scheduler; `stop()` (or dropping the manager) stops
//! it.

use std::sync::Arc;

use super::callback::Callback;
use super::scheduler::{PollingScheduler, RegistryFor, SchedulerOptions};
use super::source::{OrderSource, PollSource, PriceSource};
use crate::application::ports::{OrderGateway, QuoteFetcher};
use crate::domain::instrument::InstrumentRef;
use crate::domain::order::OrderRef;
use crate::domain::subscription::change::{OrderUpdate, PriceChange};
use crate::domain::subscription::{SubscriptionConfig, SubscriptionId, SubscriptionInfo};
use crate::error::SdkError;

/// Manager for quote subscriptions.
pub type PriceSubscriptionManager = SubscriptionManager<PriceSource>;

/// Manager for order status subscriptions.
pub type OrderSubscriptionManager = SubscriptionManager<OrderSource>;

/// Registry plus background scheduler for one poll source.
pub struct SubscriptionManager<S: PollSource> {
    registry: Arc<RegistryFor<S>>,
    scheduler: PollingScheduler<S>,
}

impl<S: PollSource> SubscriptionManager<S> {
    /// Create a manager with a stopped scheduler.
    #[must_use]
    pub fn new(source: S, options: SchedulerOptions) -> Self {
        let registry = Arc::new(RegistryFor::<S>::new());
        let scheduler = PollingScheduler::new(Arc::new(source), Arc::clone(&registry), options);
        Self {
            registry,
            scheduler,
        }
    }

    /// Subscribe to changes of `watched`, starting the scheduler if needed.
    pub fn subscribe(
        &self,
        watched: Vec<S::Key>,
        callback: Callback<S::Change>,
        config: Option<SubscriptionConfig>,
    ) -> Result<SubscriptionId, SdkError> {
        let id = self.registry.subscribe(watched, callback, config)?;
        if let Err(err) = self.scheduler.start() {
            self.registry.unsubscribe(id);
            return Err(err);
        }
        tracing::debug!(source = S::NAME, subscription_id = %id, "Subscribed");
        Ok(id)
    }

    /// Remove a subscription. Returns false if it is unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.registry.unsubscribe(id);
        if removed {
            tracing::debug!(source = S::NAME, subscription_id = %id, "Unsubscribed");
        }
        removed
    }

    /// Remove every subscription and cached snapshot.
    pub fn unsubscribe_all(&self) {
        self.registry.unsubscribe_all();
    }

    /// Pause a subscription. Returns false if it is unknown.
    pub fn pause(&self, id: SubscriptionId) -> bool {
        self.registry.pause(id)
    }

    /// Resume a paused subscription. Returns false if it is unknown.
    pub fn resume(&self, id: SubscriptionId) -> bool {
        self.registry.resume(id)
    }

    /// Change a subscription's polling frequency in seconds.
    ///
    /// Fails with `InvalidArgument` outside `[0.1, 60]`; returns `Ok(false)`
    /// if the subscription is unknown.
    pub fn set_frequency(&self, id: SubscriptionId, seconds: f64) -> Result<bool, SdkError> {
        self.registry.set_frequency(id, seconds)
    }

    /// Ids of all active (not paused) subscriptions.
    #[must_use]
    pub fn get_active_subscriptions(&self) -> Vec<SubscriptionId> {
        self.registry.active_ids()
    }

    /// Bookkeeping snapshot of a subscription.
    #[must_use]
    pub fn get_subscription_info(&self, id: SubscriptionId) -> Option<SubscriptionInfo<S::Key>> {
        self.registry.info(id)
    }

    /// Cached snapshot for `key`, if one has been observed and is still watched.
    #[must_use]
    pub fn cached_value(&self, key: &S::Key) -> Option<S::Value> {
        self.registry.cached(key)
    }

    /// Number of subscriptions watching `key`.
    #[must_use]
    pub fn watcher_count(&self, key: &S::Key) -> usize {
        self.registry.watcher_count(key)
    }

    /// Start the scheduler. No-op if it is already running.
    pub fn start(&self) -> Result<(), SdkError> {
        self.scheduler.start()
    }

    /// Stop the scheduler. Subscriptions are kept; `start()` resumes polling.
    pub fn stop(&self) {
        self.scheduler.stop();
    }

    /// Returns true while the scheduler thread is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }
}

impl PriceSubscriptionManager {
    /// Create a quote subscription manager over a blocking quote fetcher.
    #[must_use]
    pub fn with_fetcher(fetcher: Arc<dyn QuoteFetcher>, options: SchedulerOptions) -> Self {
        Self::new(PriceSource::new(fetcher), options)
    }

    /// Subscribe to quote changes of `instruments`.
    pub fn subscribe_instruments(
        &self,
        instruments: Vec<InstrumentRef>,
        callback: Callback<PriceChange>,
        config: Option<SubscriptionConfig>,
    ) -> Result<SubscriptionId, SdkError> {
        self.subscribe(instruments, callback, config)
    }
}

impl OrderSubscriptionManager {
    /// Create an order subscription manager over a blocking order gateway.
    #[must_use]
    pub fn with_gateway(gateway: Arc<dyn OrderGateway>, options: SchedulerOptions) -> Self {
        Self::new(OrderSource::new(gateway), options)
    }

    /// Subscribe to status changes of a single order.
    pub fn subscribe_order(
        &self,
        order_id: impl Into<String>,
        account_id: impl Into<String>,
        callback: Callback<OrderUpdate>,
        config: Option<SubscriptionConfig>,
    ) -> Result<SubscriptionId, SdkError> {
        self.subscribe(vec![OrderRef::new(order_id, account_id)], callback, config)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::application::ports::{MockOrderGateway, MockQuoteFetcher};
    use crate::domain::order::{Order, OrderStatus};

    fn options() -> SchedulerOptions {
        SchedulerOptions {
            worker_threads: 2,
            stop_timeout: Duration::from_secs(2),
            default_interval: Duration::from_millis(20),
            retry_unit: Duration::from_millis(1),
        }
    }

    #[test]
    fn subscribe_starts_scheduler_and_stop_keeps_subscriptions() {
        let mut gateway = MockOrderGateway::new();
        gateway.expect_fetch_order().returning(|order_id, _| {
            Ok(Order::new(order_id, InstrumentRef::equity("AAPL"), OrderStatus::New))
        });
        let manager = OrderSubscriptionManager::with_gateway(Arc::new(gateway), options());
        assert!(!manager.is_running());

        let id = manager
            .subscribe_order("ord-1", "acc-1", Callback::blocking(|_| Ok(())), None)
            .unwrap();

        assert!(manager.is_running());
        manager.stop();
        assert!(!manager.is_running());
        assert_eq!(manager.get_active_subscriptions(), vec![id]);
    }

    #[test]
    fn order_status_change_reaches_callback() {
        let statuses = Arc::new(Mutex::new(vec![OrderStatus::Filled, OrderStatus::New]));
        let script = Arc::clone(&statuses);
        let mut gateway = MockOrderGateway::new();
        gateway.expect_fetch_order().returning(move |order_id, _| {
                let mut script = script.lock().unwrap();
                let status = if script.len() > 1 {
                    script.pop().unwrap()
                } else {
                    script[0]
                };
                Ok(Order::new(order_id, InstrumentRef::equity("AAPL"), status))
            });
        let manager = OrderSubscriptionManager::with_gateway(Arc::new(gateway), options());

        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&updates);
        manager
            .subscribe_order(
                "ord-1",
                "acc-1",
                Callback::blocking(move |update| {
                    sink.lock().unwrap().push(update);
                    Ok(())
                }),
                Some(SubscriptionConfig::with_frequency(0.1).unwrap()),
            )
            .unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(3);
        while updates.lock().unwrap().is_empty() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        manager.stop();

        let updates = updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].old_status, Some(OrderStatus::New));
        assert_eq!(updates[0].new_status, OrderStatus::Filled);
        assert_eq!(updates[0].account_id, "acc-1");
    }

    #[test]
    fn empty_instrument_list_is_rejected_without_starting() {
        let manager =
            PriceSubscriptionManager::with_fetcher(Arc::new(MockQuoteFetcher::new()), options());
        let result =
            manager.subscribe_instruments(Vec::new(), Callback::blocking(|_| Ok(())), None);
        assert!(matches!(result, Err(SdkError::InvalidArgument(_))));
        assert!(!manager.is_running());
    }
}
