//! Alpaca-specific error types.

use thiserror::Error;

use crate::application::ports::BrokerError;

/// Errors from the Alpaca adapter.
#[derive(Debug, Error, Clone)]
pub enum AlpacaError {
    /// API returned a structured error body.
    #[error("API error {code}: {message}")]
    Api {
        /// Alpaca error code.
        code: i64,
        /// Alpaca error message.
        message: String,
    },

    /// Credentials missing or rejected.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// HTTP 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// HTTP 429.
    #[error("rate limited")]
    RateLimited,

    /// Network-level failure (retryable).
    #[error("network error: {0}")]
    Network(String),

    /// Response body could not be decoded.
    #[error("JSON parsing error: {0}")]
    JsonParse(String),

    /// Transient failures persisted past the retry budget.
    #[error("max retries exceeded after {attempts} attempts")]
    MaxRetriesExceeded {
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// Order rejected (HTTP 403/422 on order submission).
    #[error("order rejected: {0}")]
    OrderRejected(String),
}

impl From<AlpacaError> for BrokerError {
    fn from(err: AlpacaError) -> Self {
        match err {
            AlpacaError::Network(msg) | AlpacaError::JsonParse(msg) => {
                Self::Connection { message: msg }
            }
            AlpacaError::MaxRetriesExceeded { attempts } => Self::Connection {
                message: format!("max retries exceeded after {attempts} attempts"),
            },
            AlpacaError::OrderRejected(reason) => Self::OrderRejected { reason },
            AlpacaError::NotFound(what) => Self::NotFound { what },
            AlpacaError::RateLimited => Self::RateLimited,
            AlpacaError::AuthenticationFailed => Self::Unknown {
                message: "authentication failed".to_string(),
            },
            AlpacaError::Api { code, message } => Self::Unknown {
                message: format!("{code}: {message}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_maps_to_connection() {
        let err: BrokerError = AlpacaError::Network("refused".to_string()).into();
        assert!(matches!(err, BrokerError::Connection { .. }));
    }

    #[test]
    fn not_found_maps_through() {
        let err: BrokerError = AlpacaError::NotFound("position".to_string()).into();
        assert!(matches!(err, BrokerError::NotFound { .. }));
    }

    #[test]
    fn rejection_maps_through() {
        let err: BrokerError = AlpacaError::OrderRejected("insufficient balance".to_string()).into();
        assert!(matches!(err, BrokerError::OrderRejected { .. }));
    }

    #[test]
    fn rate_limit_maps_through() {
        let err: BrokerError = AlpacaError::RateLimited.into();
        assert!(matches!(err, BrokerError::RateLimited));
    }
}
