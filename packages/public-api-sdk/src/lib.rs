// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Public API SDK - Polling Subscriptions
//!
//! Client-side subscription engine for the Public trading REST API. The API
//! only offers request/response calls, so quote and order changes are
//! produced by periodic polling, diffing against a snapshot cache, and
//! delivering change events to subscribers.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Plain data types and pure logic
//!   - `instrument`, `quote`, `order`: API data model
//!   - `subscription`: ids, configs and their validation
//!   - `subscription::change`: the change detector
//!
//! - **Application**: The engine, written against port traits
//!   - `ports`: quote fetcher and order gateway interfaces
//!   - `polling`: threaded keyed polling engine and managers
//!   - `stream`: cooperative pull-based price stream
//!   - `orders`: `NewOrder` / `AsyncNewOrder` handles
//!
//! - **Infrastructure**: Adapters and ambient setup
//!   - `http`: REST adapters implementing the ports
//!   - `config`: environment-driven settings
//!   - `metrics`, `telemetry`: observability
//!
//! # Data Flow
//!
//! ```text
//!                 ┌──────────────┐  fetch   ┌───────────┐
//!  subscribe ───► │   Registry   │ ◄──────► │ REST API  │
//!                 │ (keys, cache)│          └───────────┘
//!                 └──────┬───────┘
//!                        │ diff
//!                 ┌──────▼───────┐
//!                 │  Scheduler   │ ──► callback 1
//!                 │   thread     │ ──► callback N
//!                 └──────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - API data types and change detection.
pub mod domain;

/// Application layer - Subscription engine and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

/// Client facades wiring adapters into the engine.
pub mod client;

/// SDK error type.
pub mod error;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::{
    InstrumentRef, InstrumentType, Order, OrderRef, OrderStatus, OrderUpdate, PriceChange, Quote,
    QuoteField, SubscriptionConfig, SubscriptionId, SubscriptionInfo, SubscriptionStatus,
};

// Engine
pub use application::orders::{AsyncNewOrder, DEFAULT_WAIT_POLL_INTERVAL, NewOrder};
pub use application::polling::{
    Callback, CallbackError, OrderSubscriptionManager, OrderUpdateCallback, PriceChangeCallback,
    PriceSubscriptionManager, SchedulerOptions,
};
pub use application::ports::{
    AsyncOrderGateway, AsyncQuoteFetcher, FetchError, OrderGateway, QuoteFetcher,
};
pub use application::stream::{AsyncPriceStream, FetchErrorHandler, PriceUpdates};

// Clients
pub use client::{AsyncPublicApiClient, PublicApiClient};

// Errors
pub use error::{SdkError, TargetStatuses};

// Infrastructure config
pub use infrastructure::config::{ConfigError, SdkConfig};

// Metrics
pub use infrastructure::metrics::register_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
