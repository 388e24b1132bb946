//! Broker Port (Driven Port)
//!
//! Interface for the brokerage this engine trades through. The broker is
//! the single source of truth for positions and account state; nothing in
//! the engine caches either authoritatively.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::Instrument;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    /// Buy.
    Buy,
    /// Sell.
    Sell,
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Plain limit order.
    Limit,
    /// Stop-limit order: rests until the stop price trades, then becomes a
    /// limit order.
    StopLimit,
}

/// Time in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce {
    /// Immediate-or-cancel: the unfilled remainder is canceled instantly.
    Ioc,
    /// Good-till-canceled.
    Gtc,
}

/// Request to submit an order to the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOrderRequest {
    /// Client order id.
    pub client_order_id: String,
    /// Instrument to trade.
    pub instrument: Instrument,
    /// Order side.
    pub side: OrderSide,
    /// Order type.
    pub order_type: OrderType,
    /// Time in force.
    pub time_in_force: TimeInForce,
    /// Quantity.
    pub quantity: Decimal,
    /// Limit price (always set for the order types this engine submits).
    pub limit_price: Option<Decimal>,
    /// Stop trigger price (stop-limit only).
    pub stop_price: Option<Decimal>,
}

impl SubmitOrderRequest {
    /// Build a limit order request.
    #[must_use]
    pub const fn limit(
        client_order_id: String,
        instrument: Instrument,
        side: OrderSide,
        quantity: Decimal,
        limit_price: Decimal,
        time_in_force: TimeInForce,
    ) -> Self {
        Self {
            client_order_id,
            instrument,
            side,
            order_type: OrderType::Limit,
            time_in_force,
            quantity,
            limit_price: Some(limit_price),
            stop_price: None,
        }
    }

    /// Build a stop-limit order request.
    #[must_use]
    pub const fn stop_limit(
        client_order_id: String,
        instrument: Instrument,
        side: OrderSide,
        quantity: Decimal,
        stop_price: Decimal,
        limit_price: Decimal,
    ) -> Self {
        Self {
            client_order_id,
            instrument,
            side,
            order_type: OrderType::StopLimit,
            time_in_force: TimeInForce::Gtc,
            quantity,
            limit_price: Some(limit_price),
            stop_price: Some(stop_price),
        }
    }
}

/// Acknowledgment from the broker after order submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAck {
    /// Broker-assigned order id.
    pub broker_order_id: String,
    /// Client order id echoed back.
    pub client_order_id: String,
    /// Broker status string at acknowledgment ("accepted", "filled", ...).
    pub status: String,
    /// Filled quantity at acknowledgment.
    pub filled_qty: Decimal,
    /// Average fill price, when any quantity filled.
    pub avg_fill_price: Option<Decimal>,
}

/// Account equity and cash.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Total account equity.
    pub equity: Decimal,
    /// Deployable cash.
    pub cash: Decimal,
}

/// An open order as reported by the broker, used for startup recovery.
#[derive(Debug, Clone)]
pub struct OpenOrder {
    /// Broker order id.
    pub broker_order_id: String,
    /// Symbol as the broker reports it (e.g. "BTC/USD").
    pub symbol: String,
    /// Order side.
    pub side: OrderSide,
    /// Order type.
    pub order_type: OrderType,
    /// Remaining quantity.
    pub quantity: Decimal,
    /// Limit price, when set.
    pub limit_price: Option<Decimal>,
    /// Stop trigger price, when set.
    pub stop_price: Option<Decimal>,
}

/// Broker port error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrokerError {
    /// Transport-level failure (network, timeout, malformed response).
    #[error("broker connection error: {message}")]
    Connection {
        /// Error details.
        message: String,
    },

    /// Order rejected by the broker.
    #[error("order rejected: {reason}")]
    OrderRejected {
        /// Rejection reason.
        reason: String,
    },

    /// A referenced entity does not exist at the broker.
    #[error("not found: {what}")]
    NotFound {
        /// What was missing.
        what: String,
    },

    /// Rate limited by the broker.
    #[error("rate limited by broker")]
    RateLimited,

    /// Anything else.
    #[error("broker error: {message}")]
    Unknown {
        /// Error details.
        message: String,
    },
}

/// Port for broker interactions.
///
/// Every implementation must bound each call with a short network timeout:
/// a hung call in here would stall the reconciler loop.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerPort: Send + Sync {
    /// Current account equity and cash.
    async fn get_account(&self) -> Result<AccountSnapshot, BrokerError>;

    /// Live position quantity; `None` when flat.
    async fn get_position(&self, instrument: &Instrument) -> Result<Option<Decimal>, BrokerError>;

    /// Most recent trade price; `None` when the live source has nothing.
    async fn get_latest_trade(&self, instrument: &Instrument) -> Result<Option<Decimal>, BrokerError>;

    /// Submit an order.
    async fn submit_order(&self, request: SubmitOrderRequest) -> Result<OrderAck, BrokerError>;

    /// Cancel an order. `NotFound` is an acceptable outcome at every call
    /// site (the order may already be filled or canceled).
    async fn cancel_order(&self, broker_order_id: &str) -> Result<(), BrokerError>;

    /// All currently open orders, for startup recovery.
    async fn get_open_orders(&self) -> Result<Vec<OpenOrder>, BrokerError>;
}
