//! Polling Metrics
//!
//! Counters and gauges for the subscription engine, recorded through the
//! `metrics` facade. The SDK never installs a recorder; applications that
//! want these numbers install an exporter of their choice and optionally call
//! [`register_metrics`] to attach descriptions.
//!
//! # Metrics Categories
//!
//! - **Cycles**: Poll cycles executed and their duration
//! - **Fetches**: Fetch failures (by transient flag) and retries
//! - **Changes**: Change events detected and callback failures
//! - **Subscriptions**: Active subscription count
//!
//! Every metric carries a `source` label (`quotes`, `orders` or `stream`).

use std::sync::Once;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

static REGISTER: Once = Once::new();

// =============================================================================
// Metric Registration
// =============================================================================

/// Describe all SDK metrics to the installed recorder. Idempotent.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        describe_counter!(
            "public_sdk_poll_cycles_total",
            "Total group poll cycles executed"
        );
        describe_histogram!(
            "public_sdk_poll_cycle_seconds",
            "Duration of a group poll cycle including callbacks"
        );
        describe_counter!(
            "public_sdk_fetch_failures_total",
            "Total failed fetch attempts by transient flag"
        );
        describe_counter!(
            "public_sdk_fetch_retries_total",
            "Total fetch retries scheduled after transient failures"
        );
        describe_counter!(
            "public_sdk_changes_total",
            "Total change events detected"
        );
        describe_counter!(
            "public_sdk_callback_failures_total",
            "Total callback invocations that returned an error or panicked"
        );
        describe_gauge!(
            "public_sdk_active_subscriptions",
            "Number of active subscriptions"
        );
    });
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a completed group poll cycle.
pub fn record_poll_cycle(source: &'static str, duration: Duration) {
    counter!("public_sdk_poll_cycles_total", "source" => source).increment(1);
    histogram!("public_sdk_poll_cycle_seconds", "source" => source).record(duration.as_secs_f64());
}

/// Record a failed fetch attempt.
pub fn record_fetch_failure(source: &'static str, transient: bool) {
    counter!(
        "public_sdk_fetch_failures_total",
        "source" => source,
        "transient" => if transient { "true" } else { "false" }
    )
    .increment(1);
}

/// Record a scheduled fetch retry.
pub fn record_retry(source: &'static str) {
    counter!("public_sdk_fetch_retries_total", "source" => source).increment(1);
}

/// Record detected change events.
pub fn record_changes(source: &'static str, count: usize) {
    counter!("public_sdk_changes_total", "source" => source).increment(count as u64);
}

/// Record a failed callback invocation.
pub fn record_callback_failure(source: &'static str) {
    counter!("public_sdk_callback_failures_total", "source" => source).increment(1);
}

/// Update the active subscription gauge.
pub fn set_active_subscriptions(source: &'static str, count: usize) {
    gauge!("public_sdk_active_subscriptions", "source" => source).set(count as f64);
}
