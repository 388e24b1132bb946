//! Instrument value object for canonical pair identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error for malformed instrument identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstrumentError {
    /// The identifier is not in `BASE/QUOTE` form.
    #[error("instrument must be BASE/QUOTE, got {input:?}")]
    Malformed {
        /// The rejected input.
        input: String,
    },

    /// A leg contains characters outside `[A-Z0-9]`.
    #[error("instrument contains invalid characters: {input:?}")]
    InvalidCharacters {
        /// The rejected input.
        input: String,
    },
}

/// A trading pair in canonical `BASE/QUOTE` form.
///
/// Examples: "BTC/USD", "ETH/USD", "SOL/USDT".
///
/// The identifier is normalized to uppercase on construction and always
/// contains exactly one `/` separating two non-empty alphanumeric legs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instrument(String);

impl Instrument {
    /// Parse and normalize an instrument identifier.
    ///
    /// # Errors
    ///
    /// Returns `InstrumentError` when the input is not `BASE/QUOTE` or a leg
    /// contains non-alphanumeric characters.
    pub fn parse(value: impl AsRef<str>) -> Result<Self, InstrumentError> {
        let canonical = value.as_ref().trim().to_uppercase();

        let mut legs = canonical.split('/');
        let (Some(base), Some(quote), None) = (legs.next(), legs.next(), legs.next()) else {
            return Err(InstrumentError::Malformed { input: canonical });
        };

        if base.is_empty() || quote.is_empty() {
            return Err(InstrumentError::Malformed { input: canonical });
        }

        let alphanumeric = |leg: &str| leg.chars().all(|c| c.is_ascii_alphanumeric());
        if !alphanumeric(base) || !alphanumeric(quote) {
            return Err(InstrumentError::InvalidCharacters { input: canonical });
        }

        Ok(Self(canonical))
    }

    /// Get the canonical `BASE/QUOTE` string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The base leg, e.g. "BTC" for "BTC/USD".
    #[must_use]
    pub fn base(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }

    /// The quote leg, e.g. "USD" for "BTC/USD".
    #[must_use]
    pub fn quote(&self) -> &str {
        self.0.split('/').nth(1).unwrap_or("")
    }

    /// The slashless form used by broker position endpoints ("BTCUSD").
    #[must_use]
    pub fn broker_symbol(&self) -> String {
        self.0.replace('/', "")
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Instrument {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Instrument {
    type Error = InstrumentError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}
