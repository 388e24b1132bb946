//! Inbound request bodies.

use rust_decimal::Decimal;
use serde::Deserialize;

/// TradingView-style webhook payload.
///
/// ```json
/// { "ticker": "BTC/USD", "signal": "BUY", "price_hint": 64230.5 }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookRequest {
    /// Instrument identifier, `BASE/QUOTE`.
    pub ticker: String,
    /// "BUY" or "SELL" (case-insensitive).
    pub signal: String,
    /// Optional price hint from the alert, used as a fallback reference
    /// and as a cross-check against the live price.
    #[serde(default)]
    pub price_hint: Option<Decimal>,
}
