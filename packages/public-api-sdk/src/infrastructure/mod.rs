//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the port interfaces defined in the
//! application layer, plus configuration and observability setup.

/// Environment-driven configuration.
pub mod config;

/// REST adapters for the brokerage API.
pub mod http;

/// `metrics` facade instrumentation for the polling engine.
pub mod metrics;

/// Tracing subscriber and OpenTelemetry initialization.
pub mod telemetry;
