//! REST Adapters
//!
//! Thin request/response adapters over the brokerage gateway that implement
//! the application ports. `BlockingHttpClient` backs the threaded engine and
//! `NewOrder`; `HttpClient` backs the async stream and `AsyncNewOrder`.
//!
//! # Error mapping
//!
//! | Status / failure | `FetchError` |
//! |------------------|--------------|
//! | 400, 422, other 4xx | `Validation` |
//! | 401, 403 | `Authentication` |
//! | 404 | `NotFound` |
//! | 429 | `RateLimited` |
//! | 408, 5xx | `Transport` |
//! | connect failure | `Connection` |
//! | request timeout | `Timeout` |
//! | bad body | `Decode` |
//!
//! There are no transport-level retries; the polling engine owns retry.

mod api_types;
mod blocking;
mod client;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;

pub use api_types::{ApiErrorResponse, QuotesRequest, QuotesResponse};
pub use blocking::BlockingHttpClient;
pub use client::HttpClient;

use crate::application::ports::FetchError;

/// User agent sent with every request.
const USER_AGENT: &str = concat!("public-api-sdk-rust/", env!("CARGO_PKG_VERSION"));

// =============================================================================
// Paths
// =============================================================================

fn quotes_path(account_id: &str) -> String {
    format!("/userapigateway/marketdata/{account_id}/quotes")
}

fn order_path(account_id: &str, order_id: &str) -> String {
    format!("/userapigateway/trading/{account_id}/order/{order_id}")
}

// =============================================================================
// Response handling
// =============================================================================

/// Decode a successful body or map the failure status.
fn decode_body<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, FetchError> {
    check_status(status, body)?;
    serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))
}

/// Map a non-success status to a `FetchError`.
fn check_status(status: StatusCode, body: &str) -> Result<(), FetchError> {
    if status.is_success() {
        return Ok(());
    }
    Err(map_status(status, error_message(status, body)))
}

fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ApiErrorResponse>(body)
        .ok()
        .and_then(|err| err.message)
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.to_string()
            } else {
                body.to_string()
            }
        })
}

fn map_status(status: StatusCode, message: String) -> FetchError {
    match status.as_u16() {
        401 | 403 => FetchError::Authentication(message),
        404 => FetchError::NotFound(message),
        429 => FetchError::RateLimited,
        code @ 400..=499 if code != 408 => FetchError::Validation(message),
        _ => FetchError::Transport {
            status: Some(status.as_u16()),
            message,
        },
    }
}

/// Classify a transport-level `reqwest` failure.
fn map_reqwest_error(err: &reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else if err.is_connect() {
        FetchError::Connection(err.to_string())
    } else if err.is_decode() {
        FetchError::Decode(err.to_string())
    } else {
        FetchError::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}
