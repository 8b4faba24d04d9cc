//! Subscription Types
//!
//! Identity, status and polling configuration of a subscription, plus the
//! read-only view handed out by `get_subscription_info`.
//!
//! # Design
//!
//! Validation of the polling frequency and retry bounds lives in free
//! functions so that every constructor and mutator (`SubscriptionConfig::new`,
//! `set_frequency`) applies exactly the same rule.

pub mod change;

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SdkError;

// =============================================================================
// Bounds
// =============================================================================

/// Smallest accepted polling frequency, in seconds.
pub const MIN_POLLING_FREQUENCY_SECS: f64 = 0.1;

/// Largest accepted polling frequency, in seconds.
pub const MAX_POLLING_FREQUENCY_SECS: f64 = 60.0;

/// Largest accepted retry count.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Validate a polling frequency in seconds and convert it to a `Duration`.
///
/// Both bounds are inclusive.
pub fn validate_polling_frequency(seconds: f64) -> Result<Duration, SdkError> {
    if !seconds.is_finite()
        || !(MIN_POLLING_FREQUENCY_SECS..=MAX_POLLING_FREQUENCY_SECS).contains(&seconds)
    {
        return Err(SdkError::InvalidArgument(format!(
            "polling frequency must be between {MIN_POLLING_FREQUENCY_SECS} and \
             {MAX_POLLING_FREQUENCY_SECS} seconds, got {seconds}"
        )));
    }
    Ok(Duration::from_secs_f64(seconds))
}

/// Validate a maximum retry count.
pub fn validate_max_retries(max_retries: u32) -> Result<u32, SdkError> {
    if max_retries > MAX_RETRIES_LIMIT {
        return Err(SdkError::InvalidArgument(format!(
            "max retries must be between 0 and {MAX_RETRIES_LIMIT}, got {max_retries}"
        )));
    }
    Ok(max_retries)
}

// =============================================================================
// Types
// =============================================================================

/// Opaque subscription identifier (random UUID, never reused).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Generate a new unique identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether the scheduler services a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    /// Polled on every due cycle.
    #[default]
    Active,
    /// Skipped by the scheduler; cache and index membership are retained.
    Paused,
}

/// Polling configuration attached to a subscription.
///
/// Fields are private so the frequency can only be set through validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionConfig {
    polling_frequency: Duration,
    retry_on_error: bool,
    max_retries: u32,
    exponential_backoff: bool,
}

impl SubscriptionConfig {
    /// Create a validated configuration.
    pub fn new(
        polling_frequency_secs: f64,
        retry_on_error: bool,
        max_retries: u32,
        exponential_backoff: bool,
    ) -> Result<Self, SdkError> {
        Ok(Self {
            polling_frequency: validate_polling_frequency(polling_frequency_secs)?,
            retry_on_error,
            max_retries: validate_max_retries(max_retries)?,
            exponential_backoff,
        })
    }

    /// Default configuration with a different polling frequency.
    pub fn with_frequency(polling_frequency_secs: f64) -> Result<Self, SdkError> {
        Ok(Self {
            polling_frequency: validate_polling_frequency(polling_frequency_secs)?,
            ..Self::default()
        })
    }

    /// Interval between polls.
    #[must_use]
    pub const fn polling_frequency(&self) -> Duration {
        self.polling_frequency
    }

    /// Whether transient fetch failures are retried.
    #[must_use]
    pub const fn retry_on_error(&self) -> bool {
        self.retry_on_error
    }

    /// Maximum retry attempts after the first failure.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Whether retry delays double on every attempt.
    #[must_use]
    pub const fn exponential_backoff(&self) -> bool {
        self.exponential_backoff
    }

    /// Change the polling frequency in place.
    pub fn set_polling_frequency(&mut self, seconds: f64) -> Result<(), SdkError> {
        self.polling_frequency = validate_polling_frequency(seconds)?;
        Ok(())
    }
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            polling_frequency: Duration::from_secs(1),
            retry_on_error: true,
            max_retries: 3,
            exponential_backoff: true,
        }
    }
}

/// Snapshot of a subscription's bookkeeping, as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionInfo<K> {
    /// Subscription identifier.
    pub id: SubscriptionId,
    /// Watched keys, in subscription order.
    pub watched: Vec<K>,
    /// Current status.
    pub status: SubscriptionStatus,
    /// Current configuration.
    pub config: SubscriptionConfig,
    /// When the scheduler last polled this subscription.
    pub last_polled: Option<Instant>,
}
