//! Shared engine state: the three ledgers behind explicit locks.

use chrono::Utc;
use tokio::sync::Mutex;

use crate::domain::{CooldownLedger, DailyRiskLedger, ExitRegistry, trading_day};

/// Owner of all mutable engine state.
///
/// One instance is created at startup and shared by `Arc` between the
/// request handlers and the reconciler. Each ledger sits behind its own
/// coarse async lock; request volume here is webhook-scale, so lock
/// granularity finer than per-ledger buys nothing. Guards on `exits` are
/// deliberately held across broker calls where the single-stop invariant
/// depends on it.
#[derive(Debug)]
pub struct EngineState {
    /// Daily risk ledger; mutated only through the risk governor.
    pub risk: Mutex<DailyRiskLedger>,
    /// Cooldown stamps; mutated only by the entry executor.
    pub cooldowns: Mutex<CooldownLedger>,
    /// Protective-order registry; mutated by the exit planner, the
    /// reconciler, and the manual exit executor.
    pub exits: Mutex<ExitRegistry>,
}

impl EngineState {
    /// Create fresh state for the current trading day.
    #[must_use]
    pub fn new() -> Self {
        Self {
            risk: Mutex::new(DailyRiskLedger::new(trading_day(Utc::now()))),
            cooldowns: Mutex::new(CooldownLedger::new()),
            exits: Mutex::new(ExitRegistry::new()),
        }
    }
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new()
    }
}
