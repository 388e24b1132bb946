//! Fill observation: bounded polling until an entry becomes broker-visible.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use crate::config::FillSettings;
use crate::domain::Instrument;

use super::ports::BrokerPort;

/// Polls position quantity and reference price after an entry submission.
///
/// A timeout is a normal outcome, not a fault: the entry may still fill
/// later, and the caller must surface the unprotected position distinctly.
pub struct FillObserver<B: BrokerPort> {
    broker: Arc<B>,
    settings: FillSettings,
    shutdown: CancellationToken,
}

impl<B: BrokerPort> FillObserver<B> {
    /// Create an observer.
    pub fn new(broker: Arc<B>, settings: FillSettings, shutdown: CancellationToken) -> Self {
        Self {
            broker,
            settings,
            shutdown,
        }
    }

    /// Wait for the position and a reference price to become visible.
    ///
    /// Polls at the configured interval for at most the configured number
    /// of attempts; returns `Some((quantity, reference_price))` as soon as
    /// both are positive, `None` on timeout or engine shutdown. Broker
    /// errors during a poll count as a missed attempt and are retried.
    pub async fn await_fill(&self, instrument: &Instrument) -> Option<(Decimal, Decimal)> {
        let mut ticker = tokio::time::interval(self.settings.poll_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately; burn it so every attempt
        // observes the broker one interval after submission.
        ticker.tick().await;

        for attempt in 1..=self.settings.max_polls {
            tokio::select! {
                _ = ticker.tick() => {}
                () = self.shutdown.cancelled() => {
                    tracing::info!(instrument = %instrument, "Fill wait aborted by shutdown");
                    return None;
                }
            }

            let quantity = match self.broker.get_position(instrument).await {
                Ok(qty) => qty.unwrap_or(Decimal::ZERO),
                Err(e) => {
                    tracing::debug!(instrument = %instrument, attempt, error = %e, "Position poll failed");
                    continue;
                }
            };
            if quantity <= Decimal::ZERO {
                continue;
            }

            let price = match self.broker.get_latest_trade(instrument).await {
                Ok(price) => price.unwrap_or(Decimal::ZERO),
                Err(e) => {
                    tracing::debug!(instrument = %instrument, attempt, error = %e, "Price poll failed");
                    continue;
                }
            };
            if price > Decimal::ZERO {
                tracing::info!(
                    instrument = %instrument,
                    quantity = %quantity,
                    reference_price = %price,
                    attempt,
                    "Entry fill observed"
                );
                return Some((quantity, price));
            }
        }

        tracing::warn!(
            instrument = %instrument,
            polls = self.settings.max_polls,
            "Fill not observed within the poll budget"
        );
        None
    }
}
