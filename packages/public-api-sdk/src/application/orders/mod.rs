//! Order Tracking Handles
//!
//! Per-order handles returned when tracking an order: `NewOrder` for the
//! blocking client and `AsyncNewOrder` for the cooperative one. Both re-fetch
//! on `get_status`/`get_details`, remember the last status they saw and offer
//! the `wait_for_*` family, a bounded poll-until-status loop.
//!
//! # Timeout semantics
//!
//! The wall-clock deadline is measured from call entry. Every iteration
//! fetches first, so the final observation always happens at or after the
//! deadline; sleeps are clamped to the time remaining. `None` waits forever.

mod async_new_order;
mod new_order;

use std::time::Duration;

pub use async_new_order::AsyncNewOrder;
pub use new_order::NewOrder;

use crate::domain::order::OrderStatus;
use crate::error::{SdkError, TargetStatuses};

/// Default interval between status polls in `wait_for_*`.
pub const DEFAULT_WAIT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Reject an empty target set.
fn validate_targets(targets: &[OrderStatus]) -> Result<(), SdkError> {
    if targets.is_empty() {
        return Err(SdkError::InvalidArgument(
            "target statuses must contain at least one status".to_string(),
        ));
    }
    Ok(())
}

/// Build the timeout error for a wait.
fn wait_timeout(order_id: &str, targets: &[OrderStatus], last_status: OrderStatus) -> SdkError {
    SdkError::WaitTimeout {
        order_id: order_id.to_string(),
        targets: TargetStatuses(targets.to_vec()),
        last_status: Some(last_status),
    }
}

/// Time to sleep before the next poll, or `None` once the deadline passed.
fn next_sleep(
    elapsed: Duration,
    timeout: Option<Duration>,
    interval: Duration,
) -> Option<Duration> {
    match timeout {
        None => Some(interval),
        Some(timeout) if elapsed >= timeout => None,
        Some(timeout) => Some(interval.min(timeout - elapsed)),
    }
}
