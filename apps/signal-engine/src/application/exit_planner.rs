//! Exit planning: derives and places the take-profit ladder and stop.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::exit_plan::{self, ExitPlan, LadderConfig};
use crate::domain::{Instrument, StopRecord};

use super::ports::{BrokerError, BrokerPort, OrderSide, SubmitOrderRequest, TimeInForce};
use super::state::EngineState;

/// Error from exit placement.
///
/// Carries how far placement got so the caller can report the protection
/// gap precisely: everything placed before the failure is already recorded
/// in the registry and stays live.
#[derive(Debug, thiserror::Error)]
#[error("exit placement incomplete after {placed} orders: {source}")]
pub struct ExitPlacementError {
    /// Orders successfully placed and registered before the failure.
    pub placed: usize,
    /// The underlying broker failure.
    #[source]
    pub source: BrokerError,
}

/// Places protective orders for filled entries and records them.
pub struct ExitPlanner<B: BrokerPort> {
    broker: Arc<B>,
    state: Arc<EngineState>,
    ladder: LadderConfig,
}

impl<B: BrokerPort> ExitPlanner<B> {
    /// Create a planner.
    pub fn new(broker: Arc<B>, state: Arc<EngineState>, ladder: LadderConfig) -> Self {
        Self {
            broker,
            state,
            ladder,
        }
    }

    /// Derive the exit plan for a fill and submit it.
    ///
    /// Take-profit tiers go out as GTC limit sells; the stop as a GTC
    /// stop-limit sell. If a stop is already registered for the instrument
    /// it is canceled before the new one is submitted, so the instrument
    /// never carries two live stops. Order ids are recorded in the exit
    /// registry as each submission is acknowledged.
    ///
    /// # Errors
    ///
    /// Returns `ExitPlacementError` when a submission fails; orders placed
    /// before the failure remain live and registered.
    pub async fn plan_and_place(
        &self,
        instrument: &Instrument,
        quantity: Decimal,
        reference_price: Decimal,
    ) -> Result<ExitPlan, ExitPlacementError> {
        let plan = exit_plan::build_plan(&self.ladder, instrument.clone(), quantity, reference_price);
        if plan.scaled_down {
            tracing::warn!(
                instrument = %instrument,
                quantity = %quantity,
                "Tier fractions over-allocated; ladder scaled down to the fill"
            );
        }

        // Held across the placements: the reconciler must not observe (or
        // mutate) a half-written entry.
        let mut exits = self.state.exits.lock().await;

        // Never two live stops on one instrument: displace first.
        let displaced = exits.get(instrument).and_then(|e| e.stop.clone());
        if let Some(old) = displaced {
            tracing::info!(
                instrument = %instrument,
                order_id = %old.order_id,
                "Canceling superseded stop before replacement"
            );
            cancel_quietly(self.broker.as_ref(), &old.order_id).await;
        }

        let mut placed = 0usize;

        for tier in &plan.take_profits {
            let request = SubmitOrderRequest::limit(
                Uuid::new_v4().to_string(),
                instrument.clone(),
                OrderSide::Sell,
                tier.quantity,
                tier.price,
                TimeInForce::Gtc,
            );
            let ack = self
                .broker
                .submit_order(request)
                .await
                .map_err(|source| ExitPlacementError { placed, source })?;
            exits.add_take_profit(instrument, tier.name.clone(), ack.broker_order_id.clone());
            placed += 1;
            tracing::info!(
                instrument = %instrument,
                tier = %tier.name,
                price = %tier.price,
                quantity = %tier.quantity,
                order_id = %ack.broker_order_id,
                "Take-profit placed"
            );
        }

        if let Some(stop) = &plan.stop {
            let request = SubmitOrderRequest::stop_limit(
                Uuid::new_v4().to_string(),
                instrument.clone(),
                OrderSide::Sell,
                stop.quantity,
                stop.trigger_price,
                stop.limit_price,
            );
            let ack = self
                .broker
                .submit_order(request)
                .await
                .map_err(|source| ExitPlacementError { placed, source })?;
            exits.replace_stop(
                instrument,
                StopRecord {
                    order_id: ack.broker_order_id.clone(),
                    quantity: stop.quantity,
                    trigger_price: stop.trigger_price,
                },
            );
            tracing::info!(
                instrument = %instrument,
                trigger = %stop.trigger_price,
                limit = %stop.limit_price,
                quantity = %stop.quantity,
                order_id = %ack.broker_order_id,
                "Protective stop placed"
            );
        } else {
            tracing::warn!(
                instrument = %instrument,
                quantity = %quantity,
                "Fill below minimum order quantity; no protective orders possible"
            );
        }

        Ok(plan)
    }
}

/// Cancel an order, swallowing failures.
///
/// Cancellation is idempotent from the engine's point of view: the order
/// may already be filled or canceled, and either way there is nothing
/// left to protect against.
pub async fn cancel_quietly<B: BrokerPort>(broker: &B, order_id: &str) {
    if let Err(e) = broker.cancel_order(order_id).await {
        tracing::debug!(order_id = %order_id, error = %e, "Cancel ignored");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{MockBrokerPort, OrderAck, OrderType};
    use mockall::predicate::always;
    use rust_decimal_macros::dec;

    fn btc() -> Instrument {
        Instrument::parse("BTC/USD").unwrap()
    }

    fn ack(id: &str) -> OrderAck {
        OrderAck {
            broker_order_id: id.to_string(),
            client_order_id: "cid".to_string(),
            status: "accepted".to_string(),
            filled_qty: dec!(0),
            avg_fill_price: None,
        }
    }

    #[tokio::test]
    async fn places_ladder_and_stop_and_registers_ids() {
        let mut broker = MockBrokerPort::new();
        let mut submissions = 0;
        broker.expect_submit_order().times(3).returning(move |req| {
            submissions += 1;
            match submissions {
                1 | 2 => assert_eq!(req.order_type, OrderType::Limit),
                _ => assert_eq!(req.order_type, OrderType::StopLimit),
            }
            Ok(ack(&format!("o{submissions}")))
        });

        let state = Arc::new(EngineState::new());
        let planner = ExitPlanner::new(Arc::new(broker), Arc::clone(&state), LadderConfig::default());

        let plan = planner
            .plan_and_place(&btc(), dec!(10), dec!(100))
            .await
            .unwrap();
        assert_eq!(plan.take_profits.len(), 2);

        let exits = state.exits.lock().await;
        let entry = exits.get(&btc()).unwrap();
        assert_eq!(entry.take_profits.len(), 2);
        assert_eq!(entry.stop.as_ref().unwrap().order_id, "o3");
        assert_eq!(entry.stop.as_ref().unwrap().quantity, dec!(10));
    }

    #[tokio::test]
    async fn existing_stop_is_canceled_before_replacement() {
        let mut broker = MockBrokerPort::new();
        broker
            .expect_cancel_order()
            .with(mockall::predicate::eq("stale-stop"))
            .times(1)
            .returning(|_| Ok(()));
        broker
            .expect_submit_order()
            .returning(|_| Ok(ack("fresh")));

        let state = Arc::new(EngineState::new());
        {
            let mut exits = state.exits.lock().await;
            exits.replace_stop(
                &btc(),
                StopRecord {
                    order_id: "stale-stop".to_string(),
                    quantity: dec!(10),
                    trigger_price: dec!(99),
                },
            );
        }

        let planner = ExitPlanner::new(Arc::new(broker), Arc::clone(&state), LadderConfig::default());
        planner
            .plan_and_place(&btc(), dec!(10), dec!(100))
            .await
            .unwrap();

        let exits = state.exits.lock().await;
        let stop = exits.stop(&btc()).unwrap();
        assert_eq!(stop.order_id, "fresh");
    }

    #[tokio::test]
    async fn partial_failure_keeps_placed_orders_registered() {
        let mut broker = MockBrokerPort::new();
        let mut submissions = 0;
        broker
            .expect_submit_order()
            .with(always())
            .returning(move |_| {
                submissions += 1;
                if submissions == 1 {
                    Ok(ack("tp1-id"))
                } else {
                    Err(BrokerError::Connection {
                        message: "down".to_string(),
                    })
                }
            });

        let state = Arc::new(EngineState::new());
        let planner = ExitPlanner::new(Arc::new(broker), Arc::clone(&state), LadderConfig::default());

        let err = planner
            .plan_and_place(&btc(), dec!(10), dec!(100))
            .await
            .unwrap_err();
        assert_eq!(err.placed, 1);

        let exits = state.exits.lock().await;
        let entry = exits.get(&btc()).unwrap();
        assert_eq!(entry.take_profits.len(), 1);
        assert!(entry.stop.is_none());
    }

    #[tokio::test]
    async fn cancel_failures_are_swallowed() {
        let mut broker = MockBrokerPort::new();
        broker.expect_cancel_order().returning(|_| {
            Err(BrokerError::NotFound {
                what: "order gone".to_string(),
            })
        });
        cancel_quietly(&broker, "gone").await;
    }
}
