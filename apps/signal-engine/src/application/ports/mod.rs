//! Application ports: interfaces to external systems.

pub mod broker_port;

pub use broker_port::{
    AccountSnapshot, BrokerError, BrokerPort, OpenOrder, OrderAck, OrderSide, OrderType,
    SubmitOrderRequest, TimeInForce,
};

#[cfg(test)]
pub use broker_port::MockBrokerPort;
