//! Cooperative order handle.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{DEFAULT_WAIT_POLL_INTERVAL, next_sleep, validate_targets, wait_timeout};
use crate::application::ports::AsyncOrderGateway;
use crate::domain::order::{Order, OrderRef, OrderStatus};
use crate::error::SdkError;

/// Handle on a placed order for the async client.
///
/// Has no update subscriptions; poll with `wait_for_status` or
/// `get_status` instead.
pub struct AsyncNewOrder {
    order: OrderRef,
    gateway: Arc<dyn AsyncOrderGateway>,
    last_known_status: Mutex<Option<OrderStatus>>,
}

impl AsyncNewOrder {
    /// Create a handle for an existing order.
    #[must_use]
    pub fn new(
        order_id: impl Into<String>,
        account_id: impl Into<String>,
        gateway: Arc<dyn AsyncOrderGateway>,
    ) -> Self {
        Self {
            order: OrderRef::new(order_id, account_id),
            gateway,
            last_known_status: Mutex::new(None),
        }
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
    pub async fn last_known_status(&self) -> Option<OrderStatus> {
        *self.last_known_status.lock().await
    }

    /// Fetch the current status.
    pub async fn get_status(&self) -> Result<OrderStatus, SdkError> {
        Ok(self.get_details().await?.status)
    }

    /// Fetch the full order details.
    pub async fn get_details(&self) -> Result<Order, SdkError> {
        let order = self
            .gateway
            .fetch_order(&self.order.order_id, &self.order.account_id)
            .await?;
        *self.last_known_status.lock().await = Some(order.status);
        Ok(order)
    }

    /// Request cancellation without waiting for it to take effect.
    pub async fn cancel(&self) -> Result<(), SdkError> {
        self.gateway
            .cancel_order(&self.order.order_id, &self.order.account_id)
            .await?;
        tracing::info!(order_id = %self.order.order_id, "Order cancel requested");
        Ok(())
    }

    /// Wait until the order reaches one of `targets`.
    ///
    /// Sleeps with the runtime timer, so other tasks keep running between
    /// polls.
    pub async fn wait_for_status(
        &self,
        targets: &[OrderStatus],
        timeout: Option<Duration>,
        polling_interval: Duration,
    ) -> Result<Order, SdkError> {
        validate_targets(targets)?;
        let started = Instant::now();

        loop {
            let order = self.get_details().await?;
            if targets.contains(&order.status) {
                return Ok(order);
            }

            let Some(pause) = next_sleep(started.elapsed(), timeout, polling_interval) else {
                return Err(wait_timeout(&self.order.order_id, targets, order.status));
            };
            tokio::time::sleep(pause).await;
        }
    }

    /// Wait until the order is filled.
    pub async fn wait_for_fill(&self, timeout: Option<Duration>) -> Result<Order, SdkError> {
        self.wait_for_status(&[OrderStatus::Filled], timeout, DEFAULT_WAIT_POLL_INTERVAL)
            .await
    }

    /// Wait until the order reaches a terminal status.
    pub async fn wait_for_terminal_status(
        &self,
        timeout: Option<Duration>,
    ) -> Result<Order, SdkError> {
        self.wait_for_status(&OrderStatus::TERMINAL, timeout, DEFAULT_WAIT_POLL_INTERVAL)
            .await
    }
}

impl fmt::Debug for AsyncNewOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncNewOrder")
            .field("order_id", &self.order.order_id)
            .field("account_id", &self.order.account_id)
            .finish_non_exhaustive()
    }
}
