//! Change Detector
//!
//! Pure comparison of two successive snapshots of the same key. Values are
//! compared by equality, never identity, and the first observation of a key
//! (no previous snapshot) is a baseline and produces no change.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::domain::instrument::InstrumentRef;
use crate::domain::order::{Order, OrderStatus};
use crate::domain::quote::Quote;

// =============================================================================
// Price changes
// =============================================================================

/// Quote field watched for price changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuoteField {
    /// Last trade price.
    Last,
    /// Best bid.
    Bid,
    /// Best ask.
    Ask,
}

impl QuoteField {
    /// Get the field name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Last => "last",
            Self::Bid => "bid",
            Self::Ask => "ask",
        }
    }
}

impl fmt::Display for QuoteField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected change between two quotes of the same instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceChange {
    /// Instrument whose quote changed.
    pub instrument: InstrumentRef,
    /// Previous snapshot.
    pub old_quote: Option<Quote>,
    /// New snapshot.
    pub new_quote: Quote,
    /// Fields that differ, in last/bid/ask order.
    pub changed_fields: Vec<QuoteField>,
    /// When the change was detected.
    pub timestamp: DateTime<Utc>,
}

impl PriceChange {
    /// Returns true if the given field changed.
    #[must_use]
    pub fn has_changed(&self, field: QuoteField) -> bool {
        self.changed_fields.contains(&field)
    }
}

/// List the watched quote fields that differ between two snapshots.
#[must_use]
pub fn changed_quote_fields(old: &Quote, new: &Quote) -> Vec<QuoteField> {
    let mut fields = Vec::with_capacity(3);
    if old.last != new.last {
        fields.push(QuoteField::Last);
    }
    if old.bid != new.bid {
        fields.push(QuoteField::Bid);
    }
    if old.ask != new.ask {
        fields.push(QuoteField::Ask);
    }
    fields
}

/// Compare a cached quote against a fresh one.
///
/// Returns `None` for the first observation or when no watched field differs.
#[must_use]
pub fn detect_price_change(old: Option<&Quote>, new: &Quote) -> Option<PriceChange> {
    let old = old?;
    let changed_fields = changed_quote_fields(old, new);
    if changed_fields.is_empty() {
        return None;
    }
    Some(PriceChange {
        instrument: new.instrument.clone(),
        old_quote: Some(old.clone()),
        new_quote: new.clone(),
        changed_fields,
        timestamp: Utc::now(),
    })
}

// =============================================================================
// Order updates
// =============================================================================

/// A detected status transition of a tracked order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderUpdate {
    /// Order identifier.
    pub order_id: String,
    /// Owning account.
    pub account_id: String,
    /// Previous status, if one was observed.
    pub old_status: Option<OrderStatus>,
    /// New status.
    pub new_status: OrderStatus,
    /// Full order details at the time of the change.
    pub order: Order,
    /// When the change was detected.
    pub timestamp: DateTime<Utc>,
}

/// Compare a cached order against a fresh one.
///
/// Only the status is diffed. Returns `None` for the first observation.
#[must_use]
pub fn detect_order_change(
    account_id: &str,
    old: Option<&Order>,
    new: &Order,
) -> Option<OrderUpdate> {
    let old = old?;
    if old.status == new.status {
        return None;
    }
    Some(OrderUpdate {
        order_id: new.order_id.clone(),
        account_id: account_id.to_string(),
        old_status: Some(old.status),
        new_status: new.status,
        order: new.clone(),
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;

    fn quote(last: Decimal, bid: Decimal, ask: Decimal) -> Quote {
        Quote::new(InstrumentRef::equity("AAPL"), Some(last), Some(bid), Some(ask))
    }

    #[test]
    fn first_observation_is_baseline_only() {
        let q = quote(dec!(100), dec!(99.9), dec!(100.1));
        assert!(detect_price_change(None, &q).is_none());
    }

    #[test]
    fn identical_quotes_produce_no_change() {
        let q = quote(dec!(100), dec!(99.9), dec!(100.1));
        assert!(detect_price_change(Some(&q), &q).is_none());
    }

    #[test]
    fn equal_values_with_different_scale_are_not_a_change() {
        let old = quote(dec!(100), dec!(99.9), dec!(100.1));
        let new = quote(dec!(100.00), dec!(99.90), dec!(100.10));
        assert!(detect_price_change(Some(&old), &new).is_none());
    }

    #[test]
    fn last_change_is_reported() {
        let old = quote(dec!(100), dec!(99.9), dec!(100.1));
        let new = quote(dec!(101), dec!(99.9), dec!(100.1));

        let change = detect_price_change(Some(&old), &new).unwrap();

        assert_eq!(change.changed_fields, vec![QuoteField::Last]);
        assert!(change.has_changed(QuoteField::Last));
        assert_eq!(change.old_quote, Some(old));
        assert_eq!(change.new_quote, new);
    }

    #[test]
    fn all_fields_reported_in_order() {
        let old = quote(dec!(100), dec!(99.9), dec!(100.1));
        let new = quote(dec!(101), dec!(100.9), dec!(101.1));
        let change = detect_price_change(Some(&old), &new).unwrap();
        assert_eq!(
            change.changed_fields,
            vec![QuoteField::Last, QuoteField::Bid, QuoteField::Ask]
        );
    }

    #[test]
    fn price_appearing_counts_as_change() {
        let old = Quote::new(InstrumentRef::equity("AAPL"), None, None, None);
        let new = Quote::new(InstrumentRef::equity("AAPL"), None, Some(dec!(1)), None);
        let change = detect_price_change(Some(&old), &new).unwrap();
        assert_eq!(change.changed_fields, vec![QuoteField::Bid]);
    }

    #[test]
    fn non_watched_fields_are_ignored() {
        let old = quote(dec!(100), dec!(99.9), dec!(100.1));
        let mut new = old.clone();
        new.volume = Some(42);
        assert!(detect_price_change(Some(&old), &new).is_none());
    }

    #[test]
    fn order_status_transition_is_reported() {
        let old = Order::new("ord-1", InstrumentRef::equity("AAPL"), OrderStatus::New);
        let new = Order::new("ord-1", InstrumentRef::equity("AAPL"), OrderStatus::Filled);

        let update = detect_order_change("acc-1", Some(&old), &new).unwrap();

        assert_eq!(update.order_id, "ord-1");
        assert_eq!(update.account_id, "acc-1");
        assert_eq!(update.old_status, Some(OrderStatus::New));
        assert_eq!(update.new_status, OrderStatus::Filled);
    }

    #[test]
    fn order_without_status_change_is_ignored() {
        let old = Order::new("ord-1", InstrumentRef::equity("AAPL"), OrderStatus::New);
        let mut new = old.clone();
        new.filled_quantity = Some(dec!(1));
        assert!(detect_order_change("acc-1", Some(&old), &new).is_none());
        assert!(detect_order_change("acc-1", None, &new).is_none());
    }

    proptest! {
        #[test]
        fn detection_is_deterministic(
            a in -10_000i64..10_000,
            b in -10_000i64..10_000,
            c in -10_000i64..10_000,
            d in -10_000i64..10_000,
        ) {
            let old = quote(Decimal::new(a, 2), Decimal::new(b, 2), Decimal::new(c, 2));
            let new = quote(Decimal::new(d, 2), Decimal::new(b, 2), Decimal::new(c, 2));

            let first = changed_quote_fields(&old, &new);
            let second = changed_quote_fields(&old, &new);
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.contains(&QuoteField::Last), a != d);
            prop_assert!(!first.contains(&QuoteField::Bid));
        }

        #[test]
        fn a_quote_never_differs_from_itself(a in -10_000i64..10_000) {
            let q = quote(Decimal::new(a, 2), Decimal::new(a, 1), Decimal::new(a, 3));
            prop_assert!(changed_quote_fields(&q, &q).is_empty());
        }
    }
}
