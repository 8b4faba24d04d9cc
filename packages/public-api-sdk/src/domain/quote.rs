//! Market quotes returned by the quotes endpoint.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::instrument::InstrumentRef;

/// Outcome of a single quote lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteOutcome {
    /// Quote data is present.
    #[default]
    Success,
    /// The instrument could not be quoted.
    Unknown,
}

/// Point-in-time quote for one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Quoted instrument.
    pub instrument: InstrumentRef,
    /// Lookup outcome.
    #[serde(default)]
    pub outcome: QuoteOutcome,
    /// Last trade price.
    #[serde(default)]
    pub last: Option<Decimal>,
    /// Time of the last trade.
    #[serde(default)]
    pub last_timestamp: Option<DateTime<Utc>>,
    /// Best bid.
    #[serde(default)]
    pub bid: Option<Decimal>,
    /// Size at the best bid.
    #[serde(default)]
    pub bid_size: Option<u64>,
    /// Time of the last bid update.
    #[serde(default)]
    pub bid_timestamp: Option<DateTime<Utc>>,
    /// Best ask.
    #[serde(default)]
    pub ask: Option<Decimal>,
    /// Size at the best ask.
    #[serde(default)]
    pub ask_size: Option<u64>,
    /// Time of the last ask update.
    #[serde(default)]
    pub ask_timestamp: Option<DateTime<Utc>>,
    /// Volume traded on the day of the last trade.
    #[serde(default)]
    pub volume: Option<u64>,
    /// Open interest (options only).
    #[serde(default)]
    pub open_interest: Option<u64>,
}

impl Quote {
    /// Create a quote carrying only last/bid/ask prices.
    #[must_use]
    pub const fn new(
        instrument: InstrumentRef,
        last: Option<Decimal>,
        bid: Option<Decimal>,
        ask: Option<Decimal>,
    ) -> Self {
        Self {
            instrument,
            outcome: QuoteOutcome::Success,
            last,
            last_timestamp: None,
            bid,
            bid_size: None,
            bid_timestamp: None,
            ask,
            ask_size: None,
            ask_timestamp: None,
            volume: None,
            open_interest: None,
        }
    }

    /// Get the mid price, if both sides are quoted.
    #[must_use]
    pub fn mid(&self) -> Option<Decimal> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::from(2)),
            _ => None,
        }
    }
}
