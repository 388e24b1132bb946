//! Alpaca adapter configuration.

use std::time::Duration;

/// Environment for the Alpaca API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlpacaEnvironment {
    /// Paper trading (simulated).
    Paper,
    /// Live trading (real money).
    Live,
}

impl AlpacaEnvironment {
    /// Base URL for the trading API.
    #[must_use]
    pub const fn trading_base_url(&self) -> &'static str {
        match self {
            Self::Paper => "https://paper-api.alpaca.markets",
            Self::Live => "https://api.alpaca.markets",
        }
    }

    /// Base URL for the market data API (shared across environments).
    #[must_use]
    pub const fn data_base_url(&self) -> &'static str {
        "https://data.alpaca.markets"
    }

    /// Whether this is live trading.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }
}

impl std::fmt::Display for AlpacaEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Paper => write!(f, "paper"),
            Self::Live => write!(f, "live"),
        }
    }
}

/// Configuration for the Alpaca broker adapter.
#[derive(Debug, Clone)]
pub struct AlpacaConfig {
    /// API key id.
    pub api_key_id: String,
    /// API secret key.
    pub api_secret_key: String,
    /// Trading environment.
    pub environment: AlpacaEnvironment,
    /// Per-request HTTP timeout. Kept short so a hung broker call cannot
    /// stall the reconciler loop.
    pub timeout: Duration,
    /// Retry policy.
    pub retry: RetryConfig,
    /// Trading API base URL override, for tests against a local server.
    pub trading_base_url_override: Option<String>,
    /// Data API base URL override, for tests against a local server.
    pub data_base_url_override: Option<String>,
}

impl AlpacaConfig {
    /// Create a configuration with default timeout and retry policy.
    #[must_use]
    pub fn new(
        api_key_id: String,
        api_secret_key: String,
        environment: AlpacaEnvironment,
    ) -> Self {
        Self {
            api_key_id,
            api_secret_key,
            environment,
            timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
            trading_base_url_override: None,
            data_base_url_override: None,
        }
    }

    /// Build from the process environment.
    ///
    /// Reads `ALPACA_API_KEY_ID`, `ALPACA_API_SECRET_KEY`, and `ALPACA_ENV`
    /// ("paper" unless set to "live").
    ///
    /// # Errors
    ///
    /// Returns an error string when either credential is missing.
    pub fn from_env() -> Result<Self, String> {
        let api_key_id = std::env::var("ALPACA_API_KEY_ID")
            .map_err(|_| "ALPACA_API_KEY_ID is not set".to_string())?;
        let api_secret_key = std::env::var("ALPACA_API_SECRET_KEY")
            .map_err(|_| "ALPACA_API_SECRET_KEY is not set".to_string())?;
        let environment = match std::env::var("ALPACA_ENV").as_deref() {
            Ok("live") => AlpacaEnvironment::Live,
            _ => AlpacaEnvironment::Paper,
        };
        Ok(Self::new(api_key_id, api_secret_key, environment))
    }

    /// Override the HTTP timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the base URLs, for tests against a local server.
    #[must_use]
    pub fn with_base_urls(mut self, trading: String, data: String) -> Self {
        self.trading_base_url_override = Some(trading);
        self.data_base_url_override = Some(data);
        self
    }

    /// The effective trading API base URL.
    #[must_use]
    pub fn trading_base_url(&self) -> &str {
        self.trading_base_url_override
            .as_deref()
            .unwrap_or_else(|| self.environment.trading_base_url())
    }

    /// The effective data API base URL.
    #[must_use]
    pub fn data_base_url(&self) -> &str {
        self.data_base_url_override
            .as_deref()
            .unwrap_or_else(|| self.environment.data_base_url())
    }
}

/// Retry policy for transient failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum attempts before giving up.
    pub max_attempts: u32,
    /// Initial backoff delay.
    pub initial_backoff: Duration,
    /// Backoff ceiling.
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }
}
