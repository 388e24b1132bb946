//! Background reconciliation of protective orders against live positions.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::exit_plan::{LadderConfig, build_stop};
use crate::domain::{Instrument, StopRecord};

use super::exit_planner::cancel_quietly;
use super::governor::RiskGovernor;
use super::ports::{BrokerError, BrokerPort, OrderSide, SubmitOrderRequest};
use super::state::EngineState;

/// Keeps registered protective orders consistent with broker reality.
///
/// Each cycle re-reads the live position for every registered instrument.
/// A flat position means the exits closed it outside the entry path: all
/// remaining orders are canceled and the instrument unregistered. A shrunk
/// position means take-profits partially filled: the stop, still sized to
/// the full entry, would try to sell more than remains, so it is
/// cancel-and-replaced at the remaining quantity. Take-profits are left
/// resting because the broker reduces those itself as they fill.
pub struct Reconciler<B: BrokerPort> {
    broker: Arc<B>,
    state: Arc<EngineState>,
    governor: Arc<RiskGovernor<B>>,
    ladder: LadderConfig,
    interval: Duration,
}

impl<B: BrokerPort + 'static> Reconciler<B> {
    /// Create a reconciler.
    pub fn new(
        broker: Arc<B>,
        state: Arc<EngineState>,
        governor: Arc<RiskGovernor<B>>,
        ladder: LadderConfig,
        interval: Duration,
    ) -> Self {
        Self {
            broker,
            state,
            governor,
            ladder,
            interval,
        }
    }

    /// Start the supervised background loop.
    ///
    /// The task runs until the token is canceled. A failure reconciling
    /// one instrument never aborts the others and never terminates the
    /// loop.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            tracing::info!(interval_secs = self.interval.as_secs(), "Reconciler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_cycle().await;
                    }
                    () = shutdown.cancelled() => {
                        tracing::info!("Reconciler stopped");
                        break;
                    }
                }
            }
        })
    }

    /// Run one reconciliation pass over every registered instrument.
    pub async fn run_cycle(&self) {
        let instruments = {
            let exits = self.state.exits.lock().await;
            exits.instruments()
        };

        for instrument in instruments {
            if let Err(e) = self.reconcile_instrument(&instrument).await {
                tracing::warn!(
                    instrument = %instrument,
                    error = %e,
                    "Reconciliation failed; retrying next cycle"
                );
            }
        }
    }

    async fn reconcile_instrument(&self, instrument: &Instrument) -> Result<(), BrokerError> {
        // Held for the whole pass on this instrument so the exit planner
        // and manual exit cannot interleave with a half-done stop swap.
        let mut exits = self.state.exits.lock().await;
        let Some(entry) = exits.get(instrument) else {
            // Unregistered since the cycle snapshot (manual exit won).
            return Ok(());
        };
        let registered_stop = entry.stop.clone();

        let quantity = self
            .broker
            .get_position(instrument)
            .await?
            .unwrap_or(Decimal::ZERO);

        if quantity <= Decimal::ZERO {
            let Some(entry) = exits.remove(instrument) else {
                return Ok(());
            };
            for order_id in entry.order_ids() {
                cancel_quietly(self.broker.as_ref(), &order_id).await;
            }

            let is_loser = self.attribute_close(instrument, entry.stop.as_ref()).await;
            tracing::info!(
                instrument = %instrument,
                is_loser,
                "Position flat; protective orders cleaned up"
            );
            self.governor.record_trade_closed(is_loser).await;
            return Ok(());
        }

        if let Some(stop) = &registered_stop
            && stop.quantity == quantity
        {
            return Ok(());
        }

        let Some(reference_price) = self.broker.get_latest_trade(instrument).await? else {
            tracing::warn!(
                instrument = %instrument,
                "No reference price; keeping the existing stop this cycle"
            );
            return Ok(());
        };

        let Some(leg) = build_stop(&self.ladder, quantity, reference_price) else {
            tracing::warn!(
                instrument = %instrument,
                quantity = %quantity,
                "Remaining quantity below minimum; cannot size a stop"
            );
            return Ok(());
        };

        if let Some(old) = &registered_stop {
            cancel_quietly(self.broker.as_ref(), &old.order_id).await;
        }

        let request = SubmitOrderRequest::stop_limit(
            Uuid::new_v4().to_string(),
            instrument.clone(),
            OrderSide::Sell,
            leg.quantity,
            leg.trigger_price,
            leg.limit_price,
        );
        let ack = self.broker.submit_order(request).await?;
        exits.replace_stop(
            instrument,
            StopRecord {
                order_id: ack.broker_order_id.clone(),
                quantity: leg.quantity,
                trigger_price: leg.trigger_price,
            },
        );
        tracing::info!(
            instrument = %instrument,
            order_id = %ack.broker_order_id,
            quantity = %leg.quantity,
            trigger = %leg.trigger_price,
            "Protective stop resized to remaining quantity"
        );

        Ok(())
    }

    /// Decide whether a flat transition was a losing close.
    ///
    /// Heuristic: the market trading at or below the registered stop
    /// trigger when the position went flat means the stop closed it. No
    /// price or no stop record means the close is unattributable and is
    /// not counted.
    async fn attribute_close(&self, instrument: &Instrument, stop: Option<&StopRecord>) -> bool {
        let last_price = self
            .broker
            .get_latest_trade(instrument)
            .await
            .ok()
            .flatten();
        match (stop, last_price) {
            (Some(stop), Some(price)) => price <= stop.trigger_price,
            _ => {
                tracing::debug!(instrument = %instrument, "Close not attributable");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{AccountSnapshot, MockBrokerPort, OrderAck, OrderType};
    use crate::config::RiskSettings;
    use rust_decimal_macros::dec;

    fn btc() -> Instrument {
        Instrument::parse("BTC/USD").unwrap()
    }

    fn eth() -> Instrument {
        Instrument::parse("ETH/USD").unwrap()
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

    fn reconciler(
        broker: MockBrokerPort,
        state: Arc<EngineState>,
    ) -> Reconciler<MockBrokerPort> {
        let broker = Arc::new(broker);
        let governor = Arc::new(RiskGovernor::new(
            Arc::clone(&broker),
            Arc::clone(&state),
            RiskSettings::default(),
        ));
        Reconciler::new(
            broker,
            state,
            governor,
            LadderConfig::default(),
            Duration::from_millis(1),
        )
    }

    async fn seed_protected_position(state: &EngineState, instrument: &Instrument, stop_qty: Decimal) {
        let mut exits = state.exits.lock().await;
        exits.add_take_profit(instrument, "tp1", "tp1-id");
        exits.add_take_profit(instrument, "tp2", "tp2-id");
        exits.replace_stop(
            instrument,
            StopRecord {
                order_id: "stop-id".to_string(),
                quantity: stop_qty,
                trigger_price: dec!(99.10),
            },
        );
    }

    #[tokio::test]
    async fn flat_position_cleans_up_and_attributes_loser() {
        let state = Arc::new(EngineState::new());
        seed_protected_position(&state, &btc(), dec!(10)).await;

        let mut broker = MockBrokerPort::new();
        broker.expect_get_position().returning(|_| Ok(None));
        broker.expect_cancel_order().times(3).returning(|_| Ok(()));
        // Market below the 99.10 trigger: the stop closed it.
        broker
            .expect_get_latest_trade()
            .returning(|_| Ok(Some(dec!(98.90))));

        let reconciler = reconciler(broker, Arc::clone(&state));
        reconciler.run_cycle().await;

        assert!(state.exits.lock().await.is_empty());
        assert_eq!(state.risk.lock().await.loser_count(), 1);
    }

    #[tokio::test]
    async fn flat_position_above_trigger_is_not_a_loser() {
        let state = Arc::new(EngineState::new());
        seed_protected_position(&state, &btc(), dec!(10)).await;

        let mut broker = MockBrokerPort::new();
        broker.expect_get_position().returning(|_| Ok(None));
        broker.expect_cancel_order().returning(|_| Ok(()));
        broker
            .expect_get_latest_trade()
            .returning(|_| Ok(Some(dec!(101.50))));

        let reconciler = reconciler(broker, Arc::clone(&state));
        reconciler.run_cycle().await;

        assert!(state.exits.lock().await.is_empty());
        assert_eq!(state.risk.lock().await.loser_count(), 0);
    }

    #[tokio::test]
    async fn shrunk_position_resizes_the_stop() {
        let state = Arc::new(EngineState::new());
        seed_protected_position(&state, &btc(), dec!(10)).await;

        let mut broker = MockBrokerPort::new();
        broker
            .expect_get_position()
            .returning(|_| Ok(Some(dec!(6))));
        broker
            .expect_get_latest_trade()
            .returning(|_| Ok(Some(dec!(102))));
        broker
            .expect_cancel_order()
            .with(mockall::predicate::eq("stop-id"))
            .times(1)
            .returning(|_| Ok(()));
        broker.expect_submit_order().times(1).returning(|req| {
            assert_eq!(req.order_type, OrderType::StopLimit);
            assert_eq!(req.side, OrderSide::Sell);
            assert_eq!(req.quantity, dec!(6));
            // 102 × (1 − 0.009)
            assert_eq!(req.stop_price, Some(dec!(101.082)));
            Ok(ack("new-stop"))
        });

        let reconciler = reconciler(broker, Arc::clone(&state));
        reconciler.run_cycle().await;

        let exits = state.exits.lock().await;
        let stop = exits.stop(&btc()).unwrap();
        assert_eq!(stop.order_id, "new-stop");
        assert_eq!(stop.quantity, dec!(6));
        // Take-profits are left resting.
        assert_eq!(exits.get(&btc()).unwrap().take_profits.len(), 2);
    }

    #[tokio::test]
    async fn unchanged_position_leaves_orders_alone() {
        let state = Arc::new(EngineState::new());
        seed_protected_position(&state, &btc(), dec!(10)).await;

        let mut broker = MockBrokerPort::new();
        broker
            .expect_get_position()
            .returning(|_| Ok(Some(dec!(10))));
        broker.expect_cancel_order().never();
        broker.expect_submit_order().never();

        let reconciler = reconciler(broker, Arc::clone(&state));
        reconciler.run_cycle().await;

        assert_eq!(state.exits.lock().await.stop(&btc()).unwrap().order_id, "stop-id");
    }

    #[tokio::test]
    async fn missing_stop_is_rearmed() {
        let state = Arc::new(EngineState::new());
        {
            let mut exits = state.exits.lock().await;
            exits.add_take_profit(&btc(), "tp1", "tp1-id");
        }

        let mut broker = MockBrokerPort::new();
        broker
            .expect_get_position()
            .returning(|_| Ok(Some(dec!(5))));
        broker
            .expect_get_latest_trade()
            .returning(|_| Ok(Some(dec!(100))));
        broker
            .expect_submit_order()
            .times(1)
            .returning(|_| Ok(ack("armed")));

        let reconciler = reconciler(broker, Arc::clone(&state));
        reconciler.run_cycle().await;

        assert_eq!(state.exits.lock().await.stop(&btc()).unwrap().order_id, "armed");
    }

    #[tokio::test]
    async fn one_failing_instrument_does_not_block_the_rest() {
        let state = Arc::new(EngineState::new());
        seed_protected_position(&state, &btc(), dec!(10)).await;
        {
            let mut exits = state.exits.lock().await;
            exits.replace_stop(
                &eth(),
                StopRecord {
                    order_id: "eth-stop".to_string(),
                    quantity: dec!(2),
                    trigger_price: dec!(50),
                },
            );
        }

        let mut broker = MockBrokerPort::new();
        broker.expect_get_position().returning(|instrument| {
            if instrument.base() == "BTC" {
                Err(BrokerError::Connection {
                    message: "timeout".to_string(),
                })
            } else {
                Ok(None)
            }
        });
        broker.expect_cancel_order().returning(|_| Ok(()));
        broker
            .expect_get_latest_trade()
            .returning(|_| Ok(Some(dec!(49))));

        let reconciler = reconciler(broker, Arc::clone(&state));
        reconciler.run_cycle().await;

        let exits = state.exits.lock().await;
        // ETH was cleaned up despite the BTC failure.
        assert!(exits.get(&eth()).is_none());
        assert!(exits.get(&btc()).is_some());
    }

    #[tokio::test]
    async fn spawned_loop_stops_on_cancellation() {
        let state = Arc::new(EngineState::new());
        let mut broker = MockBrokerPort::new();
        broker.expect_get_account().returning(|| {
            Ok(AccountSnapshot {
                equity: dec!(10_000),
                cash: dec!(10_000),
            })
        });

        let reconciler = reconciler(broker, state);
        let token = CancellationToken::new();
        let handle = reconciler.spawn(token.clone());

        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
        handle.await.unwrap();
    }
}
