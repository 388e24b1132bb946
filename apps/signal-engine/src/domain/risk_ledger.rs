//! Daily risk ledger: rolling baseline, sticky disable, trade counters.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::US::Eastern;
use rust_decimal::Decimal;
use serde::Serialize;

/// Calendar day in the fixed reference timezone (US Eastern).
///
/// All "daily" limits roll over at Eastern midnight, matching the trading
/// calendar the limits were tuned against.
#[must_use]
pub fn trading_day(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&Eastern).date_naive()
}

/// Read-only view of the ledger for the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct RiskSnapshot {
    /// Trading day the counters belong to.
    pub day: NaiveDate,
    /// Equity baseline captured at the first observation of the day.
    pub baseline_equity: Option<Decimal>,
    /// Whether new entries are halted for the rest of the day.
    pub disabled: bool,
    /// Why trading was halted, when it was.
    pub disabled_reason: Option<String>,
    /// Entries accepted today.
    pub trade_count: u32,
    /// Losing closes attributed today.
    pub loser_count: u32,
}

/// Per-day risk state.
///
/// The ledger is reset lazily: the governor calls [`DailyRiskLedger::roll_to`]
/// on every evaluation, and the reset applies on the first call after the
/// day key changes. The baseline is therefore captured at first traffic
/// after rollover, not at a fixed instant.
#[derive(Debug, Clone)]
pub struct DailyRiskLedger {
    day_key: NaiveDate,
    baseline_equity: Option<Decimal>,
    disabled: bool,
    disabled_reason: Option<String>,
    trade_count: u32,
    loser_count: u32,
}

impl DailyRiskLedger {
    /// Create a fresh ledger for the given trading day.
    #[must_use]
    pub const fn new(day: NaiveDate) -> Self {
        Self {
            day_key: day,
            baseline_equity: None,
            disabled: false,
            disabled_reason: None,
            trade_count: 0,
            loser_count: 0,
        }
    }

    /// Reset the ledger if the trading day has changed.
    ///
    /// Returns true when a rollover was applied.
    pub fn roll_to(&mut self, day: NaiveDate) -> bool {
        if day == self.day_key {
            return false;
        }
        *self = Self::new(day);
        true
    }

    /// Observe current equity, capturing the baseline on first sight,
    /// and return the day's P&L relative to it.
    pub fn observe_equity(&mut self, equity: Decimal) -> Decimal {
        let baseline = *self.baseline_equity.get_or_insert(equity);
        equity - baseline
    }

    /// Halt new entries for the rest of the day. Sticky until rollover.
    pub fn disable(&mut self, reason: impl Into<String>) {
        self.disabled = true;
        self.disabled_reason = Some(reason.into());
    }

    /// Whether entries are halted.
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// The stored halt reason, if any.
    #[must_use]
    pub fn disabled_reason(&self) -> Option<&str> {
        self.disabled_reason.as_deref()
    }

    /// Count one accepted entry submission.
    pub const fn record_open(&mut self) {
        self.trade_count += 1;
    }

    /// Count one attributed losing close.
    pub const fn record_loser(&mut self) {
        self.loser_count += 1;
    }

    /// Entries accepted today.
    #[must_use]
    pub const fn trade_count(&self) -> u32 {
        self.trade_count
    }

    /// Losing closes attributed today.
    #[must_use]
    pub const fn loser_count(&self) -> u32 {
        self.loser_count
    }

    /// Read-only snapshot for the status surface.
    #[must_use]
    pub fn snapshot(&self) -> RiskSnapshot {
        RiskSnapshot {
            day: self.day_key,
            baseline_equity: self.baseline_equity,
            disabled: self.disabled,
            disabled_reason: self.disabled_reason.clone(),
            trade_count: self.trade_count,
            loser_count: self.loser_count,
        }
    }
}
