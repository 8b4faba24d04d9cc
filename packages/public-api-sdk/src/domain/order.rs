//! Orders as reported by the trading API.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::instrument::InstrumentRef;

/// Order status in the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order accepted and working.
    New,
    /// Order partially filled.
    PartiallyFilled,
    /// Order canceled.
    Cancelled,
    /// Cancel queued until the market opens.
    QueuedCancelled,
    /// Order completely filled.
    Filled,
    /// Order rejected.
    Rejected,
    /// Replace request submitted, awaiting confirmation.
    PendingReplace,
    /// Cancel request submitted, awaiting confirmation.
    PendingCancel,
    /// Order expired.
    Expired,
    /// Order replaced by another order.
    Replaced,
}

impl OrderStatus {
    /// Statuses from which an order cannot transition any further.
    pub const TERMINAL: [Self; 5] = [
        Self::Filled,
        Self::Cancelled,
        Self::Rejected,
        Self::Expired,
        Self::Replaced,
    ];

    /// Returns true if the order is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Cancelled | Self::Rejected | Self::Expired | Self::Replaced
        )
    }

    /// Returns true if this is a pending state.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::PendingReplace | Self::PendingCancel)
    }

    /// Get the wire name of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::PartiallyFilled => "PARTIALLY_FILLED",
            Self::Cancelled => "CANCELLED",
            Self::QueuedCancelled => "QUEUED_CANCELLED",
            Self::Filled => "FILLED",
            Self::Rejected => "REJECTED",
            Self::PendingReplace => "PENDING_REPLACE",
            Self::PendingCancel => "PENDING_CANCEL",
            Self::Expired => "EXPIRED",
            Self::Replaced => "REPLACED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    /// Buy order.
    Buy,
    /// Sell order.
    Sell,
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Market order.
    Market,
    /// Limit order.
    Limit,
    /// Stop order.
    Stop,
    /// Stop-limit order.
    StopLimit,
}

/// Identity of a tracked order: order id plus the account that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderRef {
    /// Order identifier.
    pub order_id: String,
    /// Owning account.
    pub account_id: String,
}

impl OrderRef {
    /// Create a new order reference.
    #[must_use]
    pub fn new(order_id: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            account_id: account_id.into(),
        }
    }
}

impl fmt::Display for OrderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.order_id, self.account_id)
    }
}

/// Full order details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Order identifier.
    pub order_id: String,
    /// Ordered instrument.
    pub instrument: InstrumentRef,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Order type.
    #[serde(rename = "type", default)]
    pub order_type: Option<OrderType>,
    /// Order side.
    #[serde(default)]
    pub side: Option<OrderSide>,
    /// Current status.
    pub status: OrderStatus,
    /// Ordered quantity.
    #[serde(default)]
    pub quantity: Option<Decimal>,
    /// Ordered notional value.
    #[serde(default)]
    pub notional_value: Option<Decimal>,
    /// Limit price.
    #[serde(default)]
    pub limit_price: Option<Decimal>,
    /// Stop price.
    #[serde(default)]
    pub stop_price: Option<Decimal>,
    /// Time the order reached a terminal state.
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    /// Filled quantity.
    #[serde(default)]
    pub filled_quantity: Option<Decimal>,
    /// Average fill price.
    #[serde(default)]
    pub average_price: Option<Decimal>,
    /// Rejection reason, if rejected.
    #[serde(default)]
    pub reject_reason: Option<String>,
}

impl Order {
    /// Create an order with only the identifying fields and a status.
    #[must_use]
    pub fn new(
        order_id: impl Into<String>,
        instrument: InstrumentRef,
        status: OrderStatus,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            instrument,
            created_at: None,
            order_type: None,
            side: None,
            status,
            quantity: None,
            notional_value: None,
            limit_price: None,
            stop_price: None,
            closed_at: None,
            filled_quantity: None,
            average_price: None,
            reject_reason: None,
        }
    }
}
