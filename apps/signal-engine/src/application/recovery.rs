//! Startup recovery: rebuild the exit registry from live broker orders.
//!
//! The engine keeps no persistent state, so a restart would otherwise
//! forget which protective orders belong to which position and the
//! reconciler would never resize or clean them up. Before the reconciler
//! starts, the open-order book is scanned and sell-side orders are folded
//! back into the registry.

use crate::domain::{Instrument, StopRecord};

use super::ports::{BrokerError, BrokerPort, OrderSide, OrderType};
use super::state::EngineState;

/// Rebuild the exit registry from the broker's open orders.
///
/// Sell-side stop-limit orders become stop records; sell-side limit orders
/// become take-profit records. Tier names are synthesized in discovery
/// order; the original names are gone with the process, and nothing
/// downstream depends on them. Unparseable symbols are skipped with a
/// warning. Returns the number of instruments recovered.
///
/// # Errors
///
/// Returns `BrokerError` when the open-order listing itself fails.
pub async fn rebuild_exit_registry<B: BrokerPort>(
    broker: &B,
    state: &EngineState,
) -> Result<usize, BrokerError> {
    let open_orders = broker.get_open_orders().await?;

    let mut exits = state.exits.lock().await;
    let before = exits.len();

    for order in open_orders {
        if order.side != OrderSide::Sell {
            continue;
        }
        let Ok(instrument) = Instrument::parse(&order.symbol) else {
            tracing::warn!(symbol = %order.symbol, "Skipping open order with unrecognized symbol");
            continue;
        };

        match order.order_type {
            OrderType::StopLimit => {
                let Some(trigger_price) = order.stop_price else {
                    tracing::warn!(
                        order_id = %order.broker_order_id,
                        "Stop-limit order without a stop price; skipping"
                    );
                    continue;
                };
                let displaced = exits.replace_stop(
                    &instrument,
                    StopRecord {
                        order_id: order.broker_order_id.clone(),
                        quantity: order.quantity,
                        trigger_price,
                    },
                );
                if let Some(displaced) = displaced {
                    // Two live stops should be impossible; keep the later
                    // one registered and let the reconciler cancel the
                    // orphan on its next pass.
                    tracing::warn!(
                        instrument = %instrument,
                        kept = %order.broker_order_id,
                        displaced = %displaced.order_id,
                        "Multiple live stops found during recovery"
                    );
                }
            }
            OrderType::Limit => {
                let tier = format!("tp{}", exits.get(&instrument).map_or(0, |e| e.take_profits.len()) + 1);
                exits.add_take_profit(&instrument, tier, order.broker_order_id.clone());
            }
        }
    }

    let recovered = exits.len() - before;
    if recovered > 0 {
        tracing::info!(instruments = recovered, "Exit registry rebuilt from open orders");
    }
    Ok(recovered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{MockBrokerPort, OpenOrder};
    use rust_decimal_macros::dec;

    fn open_order(
        id: &str,
        symbol: &str,
        side: OrderSide,
        order_type: OrderType,
        stop_price: Option<rust_decimal::Decimal>,
    ) -> OpenOrder {
        OpenOrder {
            broker_order_id: id.to_string(),
            symbol: symbol.to_string(),
            side,
            order_type,
            quantity: dec!(5),
            limit_price: Some(dec!(101)),
            stop_price,
        }
    }

    #[tokio::test]
    async fn rebuilds_ladder_and_stop_per_instrument() {
        let mut broker = MockBrokerPort::new();
        broker.expect_get_open_orders().returning(|| {
            Ok(vec![
                open_order("o1", "BTC/USD", OrderSide::Sell, OrderType::Limit, None),
                open_order("o2", "BTC/USD", OrderSide::Sell, OrderType::Limit, None),
                open_order(
                    "o3",
                    "BTC/USD",
                    OrderSide::Sell,
                    OrderType::StopLimit,
                    Some(dec!(99.10)),
                ),
                open_order("o4", "ETH/USD", OrderSide::Sell, OrderType::Limit, None),
                // Buy-side orders are not exits.
                open_order("o5", "SOL/USD", OrderSide::Buy, OrderType::Limit, None),
            ])
        });

        let state = EngineState::new();
        let recovered = rebuild_exit_registry(&broker, &state).await.unwrap();
        assert_eq!(recovered, 2);

        let exits = state.exits.lock().await;
        let btc = Instrument::parse("BTC/USD").unwrap();
        let entry = exits.get(&btc).unwrap();
        assert_eq!(entry.take_profits.len(), 2);
        assert_eq!(entry.take_profits[0].0, "tp1");
        assert_eq!(entry.take_profits[1].0, "tp2");
        assert_eq!(entry.stop.as_ref().unwrap().order_id, "o3");
        assert_eq!(entry.stop.as_ref().unwrap().trigger_price, dec!(99.10));

        let eth = Instrument::parse("ETH/USD").unwrap();
        assert!(exits.get(&eth).is_some());
        assert!(exits.get(&Instrument::parse("SOL/USD").unwrap()).is_none());
    }

    #[tokio::test]
    async fn unparseable_symbols_are_skipped() {
        let mut broker = MockBrokerPort::new();
        broker.expect_get_open_orders().returning(|| {
            Ok(vec![open_order(
                "o1",
                "???",
                OrderSide::Sell,
                OrderType::Limit,
                None,
            )])
        });

        let state = EngineState::new();
        let recovered = rebuild_exit_registry(&broker, &state).await.unwrap();
        assert_eq!(recovered, 0);
        assert!(state.exits.lock().await.is_empty());
    }

    #[tokio::test]
    async fn listing_failure_surfaces() {
        let mut broker = MockBrokerPort::new();
        broker.expect_get_open_orders().returning(|| {
            Err(BrokerError::Connection {
                message: "down".to_string(),
            })
        });

        let state = EngineState::new();
        assert!(rebuild_exit_registry(&broker, &state).await.is_err());
    }
}
