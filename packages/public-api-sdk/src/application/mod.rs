//! Application Layer - Subscription engine and order handles.
//!
//! Everything here depends only on the domain types and the port traits;
//! the REST adapters live in `infrastructure`.

/// Port interfaces for the brokerage API.
pub mod ports;

/// Threaded keyed polling engine (price and order subscriptions).
pub mod polling;

/// Cooperative polling price stream.
pub mod stream;

/// Per-order tracking handles.
pub mod orders;
