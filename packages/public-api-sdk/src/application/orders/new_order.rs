//! Blocking order handle.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::{DEFAULT_WAIT_POLL_INTERVAL, next_sleep, validate_targets, wait_timeout};
use crate::application::polling::{OrderSubscriptionManager, OrderUpdateCallback};
use crate::application::ports::OrderGateway;
use crate::domain::order::{Order, OrderRef, OrderStatus};
use crate::domain::subscription::{SubscriptionConfig, SubscriptionId};
use crate::error::SdkError;

/// Handle on a placed order for the blocking client.
pub struct NewOrder {
    order: OrderRef,
    gateway: Arc<dyn OrderGateway>,
    subscriptions: Option<Arc<OrderSubscriptionManager>>,
    last_known_status: Mutex<Option<OrderStatus>>,
    subscription_id: Mutex<Option<SubscriptionId>>,
}

impl NewOrder {
    /// Create a handle without update subscriptions.
    #[must_use]
    pub fn new(
        order_id: impl Into<String>,
        account_id: impl Into<String>,
        gateway: Arc<dyn OrderGateway>,
    ) -> Self {
        Self {
            order: OrderRef::new(order_id, account_id),
            gateway,
            subscriptions: None,
            last_known_status: Mutex::new(None),
            subscription_id: Mutex::new(None),
        }
    }

    /// Enable `subscribe_updates` through a shared order subscription manager.
    #[must_use]
    pub fn with_subscriptions(mut self, manager: Arc<OrderSubscriptionManager>) -> Self {
        self.subscriptions = Some(manager);
        self
    }

    /// Order identifier.
    #[must_use]
    pub fn order_id(&self) -> &str {
        &self.order.order_id
    }

    /// Owning account.
    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.order.account_id
    }

    /// Status seen by the most recent successful fetch.
    #[must_use]
    pub fn last_known_status(&self) -> Option<OrderStatus> {
        *self.last_known_status.lock()
    }

    /// Fetch the current status.
    pub fn get_status(&self) -> Result<OrderStatus, SdkError> {
        Ok(self.get_details()?.status)
    }

    /// Fetch the full order details.
    pub fn get_details(&self) -> Result<Order, SdkError> {
        let order = self
            .gateway
            .fetch_order(&self.order.order_id, &self.order.account_id)?;
        *self.last_known_status.lock() = Some(order.status);
        Ok(order)
    }

    /// Request cancellation. Use `wait_for_status` to confirm it.
    pub fn cancel(&self) -> Result<(), SdkError> {
        self.gateway
            .cancel_order(&self.order.order_id, &self.order.account_id)?;
        tracing::info!(order_id = %self.order.order_id, "Order cancel requested");
        Ok(())
    }

    /// Block until the order reaches one of `targets`.
    ///
    /// Fails with `WaitTimeout` once `timeout` has elapsed; fetch errors are
    /// returned immediately.
    pub fn wait_for_status(
        &self,
        targets: &[OrderStatus],
        timeout: Option<Duration>,
        polling_interval: Duration,
    ) -> Result<Order, SdkError> {
        validate_targets(targets)?;
        let started = Instant::now();

        loop {
            let order = self.get_details()?;
            if targets.contains(&order.status) {
                return Ok(order);
            }

            let Some(pause) = next_sleep(started.elapsed(), timeout, polling_interval) else {
                return Err(wait_timeout(&self.order.order_id, targets, order.status));
            };
            std::thread::sleep(pause);
        }
    }

    /// Block until the order is filled.
    pub fn wait_for_fill(&self, timeout: Option<Duration>) -> Result<Order, SdkError> {
        self.wait_for_status(&[OrderStatus::Filled], timeout, DEFAULT_WAIT_POLL_INTERVAL)
    }

    /// Block until the order reaches a terminal status.
    pub fn wait_for_terminal_status(&self, timeout: Option<Duration>) -> Result<Order, SdkError> {
        self.wait_for_status(&OrderStatus::TERMINAL, timeout, DEFAULT_WAIT_POLL_INTERVAL)
    }

    /// Subscribe to status changes, replacing any previous subscription.
    ///
    /// Fails with `InvalidArgument` if the handle was created without a
    /// subscription manager.
    pub fn subscribe_updates(
        &self,
        callback: OrderUpdateCallback,
        config: Option<SubscriptionConfig>,
    ) -> Result<SubscriptionId, SdkError> {
        let Some(manager) = &self.subscriptions else {
            return Err(SdkError::InvalidArgument(
                "order handle has no subscription manager".to_string(),
            ));
        };

        let mut current = self.subscription_id.lock();
        if let Some(previous) = current.take() {
            manager.unsubscribe(previous);
        }
        let id = manager.subscribe_order(
            self.order.order_id.clone(),
            self.order.account_id.clone(),
            callback,
            config,
        )?;
        *current = Some(id);
        Ok(id)
    }

    /// Cancel the update subscription. Returns false if there was none.
    pub fn unsubscribe(&self) -> bool {
        let Some(id) = self.subscription_id.lock().take() else {
            return false;
        };
        self.subscriptions
            .as_ref()
            .is_some_and(|manager| manager.unsubscribe(id))
    }
}

impl fmt::Debug for NewOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewOrder")
            .field("order_id", &self.order.order_id)
            .field("account_id", &self.order.account_id)
            .finish_non_exhaustive()
    }
}
