//! Daily risk governor: gates every new entry against the day's limits.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use crate::config::RiskSettings;
use crate::domain::trading_day;

use super::ports::{BrokerError, BrokerPort};
use super::state::EngineState;

/// Halt reasons, in evaluation priority order.
pub const REASON_PROFIT_TARGET: &str = "profit target";
/// Loss limit breached.
pub const REASON_LOSS_LIMIT: &str = "loss limit";
/// Daily trade count cap reached.
pub const REASON_TRADE_CAP: &str = "trade cap";
/// Daily loser count cap reached.
pub const REASON_LOSER_CAP: &str = "loser cap";

/// Outcome of a gate evaluation.
#[derive(Debug, Clone)]
pub struct GateDecision {
    /// Whether a new entry may proceed.
    pub allow: bool,
    /// Why not, when `allow` is false.
    pub reason: Option<String>,
    /// Equity delta since the day's baseline.
    pub daily_pnl: Decimal,
    /// Entries accepted today.
    pub trade_count: u32,
    /// Losing closes attributed today.
    pub loser_count: u32,
}

/// Gates entries against the daily risk ledger.
///
/// The governor is the only component that mutates the ledger. Conditions
/// are evaluated in fixed priority order and short-circuit on the first
/// hit; any hit disables trading for the remainder of the day.
pub struct RiskGovernor<B: BrokerPort> {
    broker: Arc<B>,
    state: Arc<EngineState>,
    limits: RiskSettings,
}

impl<B: BrokerPort> RiskGovernor<B> {
    /// Create a governor over the shared ledger.
    pub fn new(broker: Arc<B>, state: Arc<EngineState>, limits: RiskSettings) -> Self {
        Self {
            broker,
            state,
            limits,
        }
    }

    /// Evaluate whether a new entry may proceed right now.
    ///
    /// Fetches live equity, applies the lazy day rollover, captures the
    /// baseline when this is the first observation of the day, then checks
    /// the limits in priority order.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError` when the account snapshot cannot be fetched;
    /// without equity there is no safe gate decision.
    pub async fn evaluate_gate(&self) -> Result<GateDecision, BrokerError> {
        let account = self.broker.get_account().await?;

        let mut ledger = self.state.risk.lock().await;
        if ledger.roll_to(trading_day(Utc::now())) {
            tracing::info!("Risk ledger rolled over to a new trading day");
        }
        let daily_pnl = ledger.observe_equity(account.equity);

        let denial = if ledger.is_disabled() {
            Some(
                ledger
                    .disabled_reason()
                    .unwrap_or("disabled")
                    .to_string(),
            )
        } else if daily_pnl >= self.limits.daily_profit_target {
            Some(REASON_PROFIT_TARGET.to_string())
        } else if daily_pnl <= -self.limits.daily_loss_limit {
            Some(REASON_LOSS_LIMIT.to_string())
        } else if ledger.trade_count() >= self.limits.max_trades_per_day {
            Some(REASON_TRADE_CAP.to_string())
        } else if ledger.loser_count() >= self.limits.max_losers_per_day {
            Some(REASON_LOSER_CAP.to_string())
        } else {
            None
        };

        if let Some(reason) = &denial {
            if !ledger.is_disabled() {
                tracing::warn!(
                    reason = %reason,
                    daily_pnl = %daily_pnl,
                    "Risk governor halting entries for the day"
                );
            }
            ledger.disable(reason.clone());
        }

        Ok(GateDecision {
            allow: denial.is_none(),
            reason: denial,
            daily_pnl,
            trade_count: ledger.trade_count(),
            loser_count: ledger.loser_count(),
        })
    }

    /// Count one accepted entry submission.
    ///
    /// Called exactly once per accepted submission, at submission time:
    /// trade frequency is bounded when orders go out, not when they fill.
    pub async fn record_trade_opened(&self) {
        let mut ledger = self.state.risk.lock().await;
        ledger.roll_to(trading_day(Utc::now()));
        ledger.record_open();
    }

    /// Attribute one closed position.
    pub async fn record_trade_closed(&self, is_loser: bool) {
        let mut ledger = self.state.risk.lock().await;
        ledger.roll_to(trading_day(Utc::now()));
        if is_loser {
            ledger.record_loser();
        }
    }
}
