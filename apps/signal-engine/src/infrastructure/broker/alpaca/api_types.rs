//! Alpaca API request and response types.
//!
//! These map directly to Alpaca's REST formats. Prices and quantities
//! travel as strings on the trading API and as numbers on the market data
//! API; both decode to `Decimal`.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order request body for `POST /v2/orders`.
#[derive(Debug, Clone, Serialize)]
pub struct AlpacaOrderRequest {
    /// Symbol, slashed for crypto pairs ("BTC/USD").
    pub symbol: String,
    /// Quantity as a string.
    pub qty: String,
    /// Order side ("buy"/"sell").
    pub side: String,
    /// Order type ("limit"/"stop_limit").
    #[serde(rename = "type")]
    pub order_type: String,
    /// Time in force ("ioc"/"gtc").
    pub time_in_force: String,
    /// Limit price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<String>,
    /// Stop trigger price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<String>,
    /// Client order id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
}

/// Order response from the trading API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaOrderResponse {
    /// Broker order id.
    pub id: String,
    /// Client order id.
    pub client_order_id: String,
    /// Symbol.
    pub symbol: String,
    /// Requested quantity.
    #[serde(default)]
    pub qty: Option<String>,
    /// Filled quantity.
    #[serde(default)]
    pub filled_qty: Option<String>,
    /// Average fill price.
    #[serde(default)]
    pub filled_avg_price: Option<String>,
    /// Order status.
    pub status: String,
    /// Order side.
    pub side: String,
    /// Order type.
    #[serde(rename = "type")]
    pub order_type: String,
    /// Limit price.
    #[serde(default)]
    pub limit_price: Option<String>,
    /// Stop price.
    #[serde(default)]
    pub stop_price: Option<String>,
}

/// Account response from `GET /v2/account`.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaAccountResponse {
    /// Account equity.
    pub equity: String,
    /// Cash balance.
    pub cash: String,
}

/// Position response from `GET /v2/positions/{symbol}`.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaPositionResponse {
    /// Symbol.
    pub symbol: String,
    /// Position quantity.
    pub qty: String,
}

/// One trade from the crypto latest-trades endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CryptoTrade {
    /// Trade price.
    #[serde(rename = "p")]
    pub price: Decimal,
}

/// Response from `GET /v1beta3/crypto/us/latest/trades`.
#[derive(Debug, Clone, Deserialize)]
pub struct CryptoLatestTradesResponse {
    /// Symbol → latest trade.
    #[serde(default)]
    pub trades: HashMap<String, CryptoTrade>,
}

/// Error body returned by the Alpaca API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaApiErrorBody {
    /// Alpaca error code.
    #[serde(default)]
    pub code: i64,
    /// Error message.
    #[serde(default)]
    pub message: String,
}

/// Parse a decimal field that arrived as an optional string.
#[must_use]
pub fn parse_decimal(value: Option<&str>) -> Option<Decimal> {
    value.and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn order_request_omits_unset_prices() {
        let request = AlpacaOrderRequest {
            symbol: "BTC/USD".to_string(),
            qty: "0.5".to_string(),
            side: "buy".to_string(),
            order_type: "limit".to_string(),
            time_in_force: "ioc".to_string(),
            limit_price: Some("100.20".to_string()),
            stop_price: None,
            client_order_id: Some("cid-1".to_string()),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "limit");
        assert_eq!(json["limit_price"], "100.20");
        assert!(json.get("stop_price").is_none());
    }

    #[test]
    fn order_response_decodes_minimal_body() {
        let body = r#"{
            "id": "b-1",
            "client_order_id": "c-1",
            "symbol": "BTC/USD",
            "status": "accepted",
            "side": "buy",
            "type": "limit"
        }"#;
        let response: AlpacaOrderResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.id, "b-1");
        assert!(response.filled_qty.is_none());
    }

    #[test]
    fn crypto_trades_decode_numeric_price() {
        let body = r#"{"trades": {"BTC/USD": {"p": 64230.5, "s": 0.01, "t": "2025-03-03T00:00:00Z"}}}"#;
        let response: CryptoLatestTradesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.trades["BTC/USD"].price, dec!(64230.5));
    }

    #[test]
    fn parse_decimal_handles_missing_and_garbage() {
        assert_eq!(parse_decimal(Some("1.5")), Some(dec!(1.5)));
        assert_eq!(parse_decimal(Some("nope")), None);
        assert_eq!(parse_decimal(None), None);
    }
}
