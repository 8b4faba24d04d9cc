//! REST request and response bodies.

use serde::{Deserialize, Serialize};

use crate::domain::instrument::InstrumentRef;
use crate::domain::quote::Quote;

/// Body of the batched quotes request.
#[derive(Debug, Clone, Serialize)]
pub struct QuotesRequest<'a> {
    /// Instruments to quote.
    pub instruments: &'a [InstrumentRef],
}

/// Batched quotes response.
#[derive(Debug, Clone, Deserialize)]
pub struct QuotesResponse {
    /// One quote per requested instrument the API knows about.
    #[serde(default)]
    pub quotes: Vec<Quote>,
}

/// Error body returned by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// Human-readable message.
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instrument::InstrumentType;

    #[test]
    fn quotes_request_serializes_symbol_and_type() {
        let instruments = [
            InstrumentRef::equity("AAPL"),
            InstrumentRef::new("BTC", InstrumentType::Crypto),
        ];
        let body = serde_json::to_value(QuotesRequest {
            instruments: &instruments,
        })
        .unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "instruments": [
                    {"symbol": "AAPL", "type": "EQUITY"},
                    {"symbol": "BTC", "type": "CRYPTO"},
                ]
            })
        );
    }

    #[test]
    fn missing_quotes_field_is_empty() {
        let response: QuotesResponse = serde_json::from_str("{}").unwrap();
        assert!(response.quotes.is_empty());
    }

    #[test]
    fn error_body_message_is_optional() {
        let body: ApiErrorResponse = serde_json::from_str(r#"{"code":"X"}"#).unwrap();
        assert!(body.message.is_none());
    }
}
