//! Errors surfaced to SDK callers.
//!
//! Only contract violations (`InvalidArgument`), stream lookups of unknown
//! subscriptions (`UnknownSubscription`) and expired waits (`WaitTimeout`)
//! come out of the subscription engine. Steady-state polling failures are
//! absorbed, retried and logged instead. Direct request/response calls on the
//! client facades and order handles surface collaborator failures as `Api`.

use std::fmt;

use thiserror::Error;

use crate::application::ports::FetchError;
use crate::domain::order::OrderStatus;
use crate::domain::subscription::SubscriptionId;
use crate::infrastructure::config::ConfigError;

/// Errors returned by the SDK.
#[derive(Debug, Error)]
pub enum SdkError {
    /// A call violated its contract (empty instrument list, out-of-range
    /// frequency or retry count).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The subscription id is not registered.
    #[error("Unknown subscription: {0}")]
    UnknownSubscription(SubscriptionId),

    /// The awaited order status was not observed before the deadline.
    #[error(
        "Timeout waiting for order {order_id} to reach status {targets}. Current status: {}",
        status_or_unknown(.last_status)
    )]
    WaitTimeout {
        /// Order being waited on.
        order_id: String,
        /// Awaited target statuses.
        targets: TargetStatuses,
        /// Last observed status, if any fetch succeeded.
        last_status: Option<OrderStatus>,
    },

    /// The REST API or transport failed.
    #[error(transparent)]
    Api(#[from] FetchError),

    /// The scheduler thread or its runtime could not be created.
    #[error("runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Set of statuses a wait is targeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetStatuses(pub Vec<OrderStatus>);

impl fmt::Display for TargetStatuses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let [single] = self.0.as_slice() {
            return write!(f, "{single}");
        }
        f.write_str("[")?;
        for (i, status) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{status}")?;
        }
        f.write_str("]")
    }
}

fn status_or_unknown(status: &Option<OrderStatus>) -> &'static str {
    status.as_ref().map_or("UNKNOWN", OrderStatus::as_str)
}
