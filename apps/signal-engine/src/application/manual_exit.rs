//! Manual exit: flatten a position on demand.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::config::EntrySettings;
use crate::domain::Instrument;

use super::exit_planner::cancel_quietly;
use super::ports::{BrokerPort, OrderSide, SubmitOrderRequest, TimeInForce};
use super::state::EngineState;
use super::EngineError;

/// Outcome of a manual exit request.
#[derive(Debug)]
pub enum ManualExitOutcome {
    /// Nothing to do: no live position.
    Skipped {
        /// Human-readable reason.
        reason: String,
    },
    /// A flatten order went out.
    Submitted {
        /// Broker order id.
        order_id: String,
        /// Liquidated quantity.
        quantity: Decimal,
        /// IOC limit price.
        limit_price: Decimal,
    },
}

/// Flattens positions outside the automated lifecycle.
///
/// Exits are permitted on any held instrument regardless of the entry
/// allow-set: an operator must always be able to get flat.
pub struct ManualExitExecutor<B: BrokerPort> {
    broker: Arc<B>,
    state: Arc<EngineState>,
    settings: EntrySettings,
}

impl<B: BrokerPort> ManualExitExecutor<B> {
    /// Create an executor.
    pub fn new(broker: Arc<B>, state: Arc<EngineState>, settings: EntrySettings) -> Self {
        Self {
            broker,
            state,
            settings,
        }
    }

    /// Cancel all registered exits, then liquidate the full live quantity.
    ///
    /// Registered orders are canceled *before* the position read: a resting
    /// take-profit or stop firing concurrently with the liquidation could
    /// oversell. Idempotent on flat instruments.
    ///
    /// # Errors
    ///
    /// `EngineError::PriceUnavailable` when no reference price exists to
    /// bound the liquidation; `EngineError::Broker` when a broker read or
    /// the submission fails.
    pub async fn exit(&self, instrument: Instrument) -> Result<ManualExitOutcome, EngineError> {
        let registered = {
            let mut exits = self.state.exits.lock().await;
            exits.remove(&instrument)
        };
        if let Some(entry) = registered {
            tracing::info!(
                instrument = %instrument,
                orders = entry.order_ids().len(),
                "Canceling registered exits ahead of manual liquidation"
            );
            for order_id in entry.order_ids() {
                cancel_quietly(self.broker.as_ref(), &order_id).await;
            }
        }

        let quantity = self
            .broker
            .get_position(&instrument)
            .await?
            .unwrap_or(Decimal::ZERO);
        if quantity <= Decimal::ZERO {
            return Ok(ManualExitOutcome::Skipped {
                reason: "no position".to_string(),
            });
        }

        let reference_price = self
            .broker
            .get_latest_trade(&instrument)
            .await?
            .ok_or(EngineError::PriceUnavailable)?;
        let limit_price = reference_price * (Decimal::ONE - self.settings.max_slippage);

        let request = SubmitOrderRequest::limit(
            Uuid::new_v4().to_string(),
            instrument.clone(),
            OrderSide::Sell,
            quantity,
            limit_price,
            TimeInForce::Ioc,
        );
        let ack = self.broker.submit_order(request).await?;
        tracing::info!(
            instrument = %instrument,
            order_id = %ack.broker_order_id,
            quantity = %quantity,
            limit_price = %limit_price,
            "Manual liquidation submitted"
        );

        Ok(ManualExitOutcome::Submitted {
            order_id: ack.broker_order_id,
            quantity,
            limit_price,
        })
    }
}
