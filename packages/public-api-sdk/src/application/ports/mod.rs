//! Application Ports (Driven)
//!
//! Interfaces of the external collaborators the subscription engine consumes.
//! The blocking traits are implemented by the blocking REST adapter and used
//! by the threaded scheduler and `NewOrder`. The async traits are implemented
//! by the cooperative REST adapter and used by `AsyncPriceStream` and
//! `AsyncNewOrder`. The two families are deliberately independent: no
//! blocking call ever drives an async future or the other way around.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::instrument::InstrumentRef;
use crate::domain::order::Order;
use crate::domain::quote::Quote;

// =============================================================================
// Errors
// =============================================================================

/// Failure of a collaborator call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Could not connect to the API.
    #[error("connection error: {0}")]
    Connection(String),

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The server or transport failed.
    #[error("transport error (status {status:?}): {message}")]
    Transport {
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Error message.
        message: String,
    },

    /// Too many requests.
    #[error("rate limited")]
    RateLimited,

    /// The request was rejected as invalid.
    #[error("validation error: {0}")]
    Validation(String),

    /// The access token was rejected.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl FetchError {
    /// Returns true if retrying the same request may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Timeout | Self::Transport { .. } | Self::RateLimited
        )
    }
}

// =============================================================================
// Blocking collaborators
// =============================================================================

/// Batched quote lookup. Must be callable from any worker thread.
#[cfg_attr(test, mockall::automock)]
pub trait QuoteFetcher: Send + Sync {
    /// Fetch the latest quotes for the given instruments.
    fn fetch_quotes(&self, instruments: &[InstrumentRef]) -> Result<Vec<Quote>, FetchError>;
}

/// Single-order lookup and cancellation. Must be callable from any worker thread.
#[cfg_attr(test, mockall::automock)]
pub trait OrderGateway: Send + Sync {
    /// Fetch the current state of an order.
    fn fetch_order(&self, order_id: &str, account_id: &str) -> Result<Order, FetchError>;

    /// Request cancellation of an order. Does not wait for confirmation.
    fn cancel_order(&self, order_id: &str, account_id: &str) -> Result<(), FetchError>;
}

// =============================================================================
// Cooperative collaborators
// =============================================================================

/// Batched quote lookup for cooperative callers.
#[async_trait]
pub trait AsyncQuoteFetcher: Send + Sync {
    /// Fetch the latest quotes for the given instruments.
    async fn fetch_quotes(&self, instruments: &[InstrumentRef]) -> Result<Vec<Quote>, FetchError>;
}

/// Single-order lookup and cancellation for cooperative callers.
#[async_trait]
pub trait AsyncOrderGateway: Send + Sync {
    /// Fetch the current state of an order.
    async fn fetch_order(&self, order_id: &str, account_id: &str) -> Result<Order, FetchError>;

    /// Request cancellation of an order. Does not wait for confirmation.
    async fn cancel_order(&self, order_id: &str, account_id: &str) -> Result<(), FetchError>;
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(FetchError::Connection("refused".into()), true ; "connection")]
    #[test_case(FetchError::Timeout, true ; "timeout")]
    #[test_case(
        FetchError::Transport { status: Some(503), message: "unavailable".into() },
        true ;
        "transport"
    )]
    #[test_case(FetchError::RateLimited, true ; "rate limited")]
    #[test_case(FetchError::Validation("bad symbol".into()), false ; "validation")]
    #[test_case(FetchError::Authentication("expired".into()), false ; "authentication")]
    #[test_case(FetchError::NotFound("ord-1".into()), false ; "not found")]
    #[test_case(FetchError::Decode("eof".into()), false ; "decode")]
    fn transient_classification(err: FetchError, expected: bool) {
        assert_eq!(err.is_transient(), expected);
    }
}
