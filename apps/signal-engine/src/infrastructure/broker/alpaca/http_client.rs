//! HTTP client wrapper with bounded retry.

use std::time::Duration;

use rand::Rng;
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::api_types::AlpacaApiErrorBody;
use super::config::{AlpacaConfig, RetryConfig};
use super::error::AlpacaError;

/// HTTP client for the Alpaca API.
///
/// Network errors, 429s, and 5xx responses are retried with exponential
/// backoff and jitter up to the configured attempt budget; everything else
/// maps to a typed error immediately.
#[derive(Debug, Clone)]
pub struct AlpacaHttpClient {
    client: Client,
    api_key_id: String,
    api_secret_key: String,
    trading_base_url: String,
    data_base_url: String,
    retry: RetryConfig,
}

impl AlpacaHttpClient {
    /// Create a client from config.
    ///
    /// # Errors
    ///
    /// `AuthenticationFailed` when credentials are empty, `Network` when
    /// the underlying client cannot be built.
    pub fn new(config: &AlpacaConfig) -> Result<Self, AlpacaError> {
        if config.api_key_id.is_empty() || config.api_secret_key.is_empty() {
            return Err(AlpacaError::AuthenticationFailed);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AlpacaError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_key_id: config.api_key_id.clone(),
            api_secret_key: config.api_secret_key.clone(),
            trading_base_url: config.trading_base_url().to_string(),
            data_base_url: config.data_base_url().to_string(),
            retry: config.retry.clone(),
        })
    }

    /// GET from the trading API.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AlpacaError> {
        self.request(Method::GET, &self.trading_base_url, path, None::<&()>)
            .await
    }

    /// POST to the trading API.
    pub async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, AlpacaError> {
        self.request(Method::POST, &self.trading_base_url, path, Some(body))
            .await
    }

    /// DELETE on the trading API.
    pub async fn delete(&self, path: &str) -> Result<(), AlpacaError> {
        let _: serde_json::Value = self
            .request(Method::DELETE, &self.trading_base_url, path, None::<&()>)
            .await?;
        Ok(())
    }

    /// GET from the market data API.
    pub async fn data_get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AlpacaError> {
        self.request(Method::GET, &self.data_base_url, path, None::<&()>)
            .await
    }

    async fn request<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        method: Method,
        base_url: &str,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, AlpacaError> {
        let url = format!("{base_url}{path}");
        let mut backoff = ExponentialBackoff::new(&self.retry);

        loop {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .header("APCA-API-KEY-ID", &self.api_key_id)
                .header("APCA-API-SECRET-KEY", &self.api_secret_key);
            if let Some(b) = body {
                request = request.json(b);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    if let Some(delay) = backoff.next_delay() {
                        tracing::warn!(
                            error = %e,
                            delay_ms = delay.as_millis(),
                            attempt = backoff.attempt,
                            "Network error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(AlpacaError::MaxRetriesExceeded {
                        attempts: backoff.attempt,
                    });
                }
            };

            let status = response.status();

            if status.is_success() {
                let text = response
                    .text()
                    .await
                    .map_err(|e| AlpacaError::Network(e.to_string()))?;
                if text.is_empty() {
                    return serde_json::from_str("null")
                        .map_err(|e| AlpacaError::JsonParse(e.to_string()));
                }
                return serde_json::from_str(&text)
                    .map_err(|e| AlpacaError::JsonParse(e.to_string()));
            }

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                if let Some(delay) = backoff.next_delay() {
                    tracing::warn!(
                        status = %status,
                        delay_ms = delay.as_millis(),
                        attempt = backoff.attempt,
                        "Transient API failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                    AlpacaError::RateLimited
                } else {
                    AlpacaError::MaxRetriesExceeded {
                        attempts: backoff.attempt,
                    }
                });
            }

            let error_body: AlpacaApiErrorBody = response
                .json()
                .await
                .unwrap_or(AlpacaApiErrorBody {
                    code: 0,
                    message: String::new(),
                });

            return Err(match status {
                StatusCode::NOT_FOUND => AlpacaError::NotFound(error_body.message),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    AlpacaError::AuthenticationFailed
                }
                StatusCode::UNPROCESSABLE_ENTITY => AlpacaError::OrderRejected(error_body.message),
                _ => AlpacaError::Api {
                    code: error_body.code,
                    message: error_body.message,
                },
            });
        }
    }
}

/// Exponential backoff with jitter.
struct ExponentialBackoff {
    attempt: u32,
    max_attempts: u32,
    delay: Duration,
    max_delay: Duration,
}

impl ExponentialBackoff {
    fn new(config: &RetryConfig) -> Self {
        Self {
            attempt: 0,
            max_attempts: config.max_attempts,
            delay: config.initial_backoff,
            max_delay: config.max_backoff,
        }
    }

    /// Delay before the next retry, or `None` when the budget is spent.
    fn next_delay(&mut self) -> Option<Duration> {
        self.attempt += 1;
        if self.attempt >= self.max_attempts {
            return None;
        }

        let jitter = rand::rng().random_range(0.8..1.2);
        let delay = self.delay.mul_f64(jitter).min(self.max_delay);
        self.delay = (self.delay * 2).min(self.max_delay);
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::broker::alpaca::config::AlpacaEnvironment;

    fn retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
        }
    }

    #[test]
    fn backoff_exhausts_after_budget() {
        let mut backoff = ExponentialBackoff::new(&retry(3));
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_none());
        assert_eq!(backoff.attempt, 3);
    }

    #[test]
    fn backoff_grows_and_caps() {
        let mut backoff = ExponentialBackoff::new(&retry(10));
        let mut last = Duration::ZERO;
        for _ in 0..8 {
            let delay = backoff.next_delay().unwrap();
            assert!(delay <= Duration::from_secs(1));
            last = delay;
        }
        // By the eighth attempt the doubling has hit the cap.
        assert!(last >= Duration::from_millis(800));
    }

    #[test]
    fn empty_credentials_are_rejected() {
        let config = AlpacaConfig::new(String::new(), String::new(), AlpacaEnvironment::Paper);
        assert!(matches!(
            AlpacaHttpClient::new(&config),
            Err(AlpacaError::AuthenticationFailed)
        ));
    }
}
