//! Alpaca broker adapter implementing `BrokerPort`.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::application::ports::{
    AccountSnapshot, BrokerError, BrokerPort, OpenOrder, OrderAck, OrderSide, OrderType,
    SubmitOrderRequest, TimeInForce,
};
use crate::domain::Instrument;

use super::api_types::{
    AlpacaAccountResponse, AlpacaOrderRequest, AlpacaOrderResponse, AlpacaPositionResponse,
    CryptoLatestTradesResponse, parse_decimal,
};
use super::config::{AlpacaConfig, AlpacaEnvironment};
use super::error::AlpacaError;
use super::http_client::AlpacaHttpClient;

/// Alpaca Markets broker adapter.
#[derive(Debug, Clone)]
pub struct AlpacaBrokerAdapter {
    client: AlpacaHttpClient,
    environment: AlpacaEnvironment,
}

impl AlpacaBrokerAdapter {
    /// Create an adapter.
    ///
    /// # Errors
    ///
    /// Returns `AlpacaError` when credentials are missing or the HTTP
    /// client cannot be built.
    pub fn new(config: &AlpacaConfig) -> Result<Self, AlpacaError> {
        let client = AlpacaHttpClient::new(config)?;
        Ok(Self {
            client,
            environment: config.environment,
        })
    }

    /// Whether this adapter trades real money.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.environment.is_live()
    }

    fn to_alpaca_order_request(request: &SubmitOrderRequest) -> AlpacaOrderRequest {
        let side = match request.side {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        };
        let order_type = match request.order_type {
            OrderType::Limit => "limit",
            OrderType::StopLimit => "stop_limit",
        };
        let time_in_force = match request.time_in_force {
            TimeInForce::Ioc => "ioc",
            TimeInForce::Gtc => "gtc",
        };

        AlpacaOrderRequest {
            symbol: request.instrument.as_str().to_string(),
            qty: request.quantity.to_string(),
            side: side.to_string(),
            order_type: order_type.to_string(),
            time_in_force: time_in_force.to_string(),
            limit_price: request.limit_price.map(|p| p.to_string()),
            stop_price: request.stop_price.map(|p| p.to_string()),
            client_order_id: Some(request.client_order_id.clone()),
        }
    }

    fn to_open_order(response: &AlpacaOrderResponse) -> OpenOrder {
        OpenOrder {
            broker_order_id: response.id.clone(),
            symbol: response.symbol.clone(),
            side: if response.side == "sell" {
                OrderSide::Sell
            } else {
                OrderSide::Buy
            },
            order_type: if response.order_type == "stop_limit" {
                OrderType::StopLimit
            } else {
                OrderType::Limit
            },
            quantity: parse_decimal(response.qty.as_deref()).unwrap_or(Decimal::ZERO),
            limit_price: parse_decimal(response.limit_price.as_deref()),
            stop_price: parse_decimal(response.stop_price.as_deref()),
        }
    }
}

#[async_trait]
impl BrokerPort for AlpacaBrokerAdapter {
    async fn get_account(&self) -> Result<AccountSnapshot, BrokerError> {
        let account: AlpacaAccountResponse = self
            .client
            .get("/v2/account")
            .await
            .map_err(BrokerError::from)?;

        let equity = account.equity.parse().map_err(|_| BrokerError::Unknown {
            message: format!("unparseable equity: {}", account.equity),
        })?;
        let cash = account.cash.parse().map_err(|_| BrokerError::Unknown {
            message: format!("unparseable cash: {}", account.cash),
        })?;

        Ok(AccountSnapshot { equity, cash })
    }

    async fn get_position(&self, instrument: &Instrument) -> Result<Option<Decimal>, BrokerError> {
        // Positions are keyed by the slashless symbol.
        let result: Result<AlpacaPositionResponse, AlpacaError> = self
            .client
            .get(&format!("/v2/positions/{}", instrument.broker_symbol()))
            .await;

        match result {
            Ok(position) => {
                let qty = position.qty.parse().map_err(|_| BrokerError::Unknown {
                    message: format!("unparseable position qty: {}", position.qty),
                })?;
                Ok(Some(qty))
            }
            Err(AlpacaError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_latest_trade(&self, instrument: &Instrument) -> Result<Option<Decimal>, BrokerError> {
        let result: Result<CryptoLatestTradesResponse, AlpacaError> = self
            .client
            .data_get(&format!(
                "/v1beta3/crypto/us/latest/trades?symbols={}",
                instrument.as_str()
            ))
            .await;

        match result {
            Ok(response) => Ok(response
                .trades
                .get(instrument.as_str())
                .map(|trade| trade.price)),
            Err(AlpacaError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn submit_order(&self, request: SubmitOrderRequest) -> Result<OrderAck, BrokerError> {
        if self.is_live() {
            tracing::warn!(
                client_order_id = %request.client_order_id,
                instrument = %request.instrument,
                "Submitting LIVE order"
            );
        }

        let alpaca_request = Self::to_alpaca_order_request(&request);
        tracing::info!(
            client_order_id = %request.client_order_id,
            instrument = %request.instrument,
            side = %alpaca_request.side,
            order_type = %alpaca_request.order_type,
            qty = %alpaca_request.qty,
            limit_price = ?alpaca_request.limit_price,
            stop_price = ?alpaca_request.stop_price,
            "Submitting order to Alpaca"
        );

        let response: AlpacaOrderResponse = self
            .client
            .post("/v2/orders", &alpaca_request)
            .await
            .map_err(BrokerError::from)?;

        Ok(OrderAck {
            broker_order_id: response.id.clone(),
            client_order_id: response.client_order_id.clone(),
            status: response.status.clone(),
            filled_qty: parse_decimal(response.filled_qty.as_deref()).unwrap_or(Decimal::ZERO),
            avg_fill_price: parse_decimal(response.filled_avg_price.as_deref()),
        })
    }

    async fn cancel_order(&self, broker_order_id: &str) -> Result<(), BrokerError> {
        self.client
            .delete(&format!("/v2/orders/{broker_order_id}"))
            .await
            .map_err(BrokerError::from)
    }

    async fn get_open_orders(&self) -> Result<Vec<OpenOrder>, BrokerError> {
        let responses: Vec<AlpacaOrderResponse> = self
            .client
            .get("/v2/orders?status=open&limit=500")
            .await
            .map_err(BrokerError::from)?;

        Ok(responses.iter().map(Self::to_open_order).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter_for(server: &MockServer) -> AlpacaBrokerAdapter {
        let config = AlpacaConfig::new(
            "key-id".to_string(),
            "secret".to_string(),
            AlpacaEnvironment::Paper,
        )
        .with_base_urls(server.uri(), server.uri());
        AlpacaBrokerAdapter::new(&config).unwrap()
    }

    fn btc() -> Instrument {
        Instrument::parse("BTC/USD").unwrap()
    }

    #[tokio::test]
    async fn account_snapshot_decodes_and_sends_auth_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/account"))
            .and(header("APCA-API-KEY-ID", "key-id"))
            .and(header("APCA-API-SECRET-KEY", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "equity": "10250.55",
                "cash": "4200.10"
            })))
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        let account = adapter.get_account().await.unwrap();
        assert_eq!(account.equity, dec!(10250.55));
        assert_eq!(account.cash, dec!(4200.10));
    }

    #[tokio::test]
    async fn missing_position_is_flat_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/positions/BTCUSD"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": 40410000,
                "message": "position does not exist"
            })))
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        assert_eq!(adapter.get_position(&btc()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn position_quantity_decodes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/positions/BTCUSD"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "symbol": "BTCUSD",
                "qty": "0.4975"
            })))
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        assert_eq!(adapter.get_position(&btc()).await.unwrap(), Some(dec!(0.4975)));
    }

    #[tokio::test]
    async fn latest_trade_reads_slashed_symbol() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1beta3/crypto/us/latest/trades"))
            .and(query_param("symbols", "BTC/USD"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "trades": {"BTC/USD": {"p": 64230.5, "s": 0.01, "t": "2025-03-03T12:00:00Z"}}
            })))
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        assert_eq!(
            adapter.get_latest_trade(&btc()).await.unwrap(),
            Some(dec!(64230.5))
        );
    }

    #[tokio::test]
    async fn submit_order_posts_expected_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/orders"))
            .and(body_partial_json(json!({
                "symbol": "BTC/USD",
                "side": "buy",
                "type": "limit",
                "time_in_force": "ioc",
                "qty": "0.5",
                "limit_price": "100.200"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "broker-1",
                "client_order_id": "cid-1",
                "symbol": "BTC/USD",
                "status": "accepted",
                "side": "buy",
                "type": "limit",
                "qty": "0.5",
                "filled_qty": "0"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        let ack = adapter
            .submit_order(SubmitOrderRequest::limit(
                "cid-1".to_string(),
                btc(),
                OrderSide::Buy,
                dec!(0.5),
                dec!(100.200),
                TimeInForce::Ioc,
            ))
            .await
            .unwrap();
        assert_eq!(ack.broker_order_id, "broker-1");
        assert_eq!(ack.filled_qty, dec!(0));
    }

    #[tokio::test]
    async fn rejected_order_maps_to_order_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/orders"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "code": 42210000,
                "message": "insufficient balance"
            })))
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        let err = adapter
            .submit_order(SubmitOrderRequest::limit(
                "cid-1".to_string(),
                btc(),
                OrderSide::Buy,
                dec!(100),
                dec!(100),
                TimeInForce::Ioc,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::OrderRejected { .. }));
    }

    #[tokio::test]
    async fn transient_failure_retries_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/account"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/account"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "equity": "100",
                "cash": "100"
            })))
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        let account = adapter.get_account().await.unwrap();
        assert_eq!(account.equity, dec!(100));
    }

    #[tokio::test]
    async fn cancel_maps_missing_order_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v2/orders/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": 40410000,
                "message": "order not found"
            })))
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        let err = adapter.cancel_order("gone").await.unwrap_err();
        assert!(matches!(err, BrokerError::NotFound { .. }));
    }

    #[tokio::test]
    async fn open_orders_decode_for_recovery() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/orders"))
            .and(query_param("status", "open"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "id": "o1",
                    "client_order_id": "c1",
                    "symbol": "BTC/USD",
                    "status": "new",
                    "side": "sell",
                    "type": "stop_limit",
                    "qty": "0.5",
                    "limit_price": "98.95",
                    "stop_price": "99.10"
                }
            ])))
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        let orders = adapter.get_open_orders().await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order_type, OrderType::StopLimit);
        assert_eq!(orders[0].stop_price, Some(dec!(99.10)));
        assert_eq!(orders[0].quantity, dec!(0.5));
    }
}
