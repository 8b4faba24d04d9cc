//! Instrument identity.
//!
//! An instrument is addressed by its symbol together with its instrument
//! type; the pair is the key used by the quote snapshot cache and the
//! instrument-to-subscription index.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Instrument type as understood by the trading API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstrumentType {
    /// Common stock or ETF.
    Equity,
    /// Listed option contract (OCC symbol).
    Option,
    /// Crypto asset.
    Crypto,
    /// Alternative asset.
    Alt,
    /// US treasury.
    Treasury,
    /// Bond.
    Bond,
    /// Market index (quote only).
    Index,
}

impl InstrumentType {
    /// Get the wire name of the instrument type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Equity => "EQUITY",
            Self::Option => "OPTION",
            Self::Crypto => "CRYPTO",
            Self::Alt => "ALT",
            Self::Treasury => "TREASURY",
            Self::Bond => "BOND",
            Self::Index => "INDEX",
        }
    }
}

impl fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a single instrument: symbol plus instrument type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstrumentRef {
    /// Ticker or OCC symbol.
    pub symbol: String,
    /// Instrument type.
    #[serde(rename = "type")]
    pub instrument_type: InstrumentType,
}

impl InstrumentRef {
    /// Create a new instrument reference.
    #[must_use]
    pub fn new(symbol: impl Into<String>, instrument_type: InstrumentType) -> Self {
        Self {
            symbol: symbol.into(),
            instrument_type,
        }
    }

    /// Shorthand for an equity instrument.
    #[must_use]
    pub fn equity(symbol: impl Into<String>) -> Self {
        Self::new(symbol, InstrumentType::Equity)
    }
}

impl fmt::Display for InstrumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.symbol, self.instrument_type)
    }
}
