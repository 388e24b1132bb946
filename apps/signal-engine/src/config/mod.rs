//! Engine settings.
//!
//! Every knob has a serde default so a settings block can be deserialized
//! from partial JSON in tests, and [`Settings::from_env`] applies the
//! operator's environment overrides on top of the defaults.

use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::exit_plan::{LadderConfig, TierSpec};

/// Entry gating and sizing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrySettings {
    /// Notional ceiling per entry, in quote currency.
    #[serde(default = "default_max_notional")]
    pub max_notional: Decimal,
    /// Optional further cap: fraction of deployable cash per entry.
    #[serde(default)]
    pub cash_fraction_cap: Option<Decimal>,
    /// Maximum fractional slippage allowed on the entry limit price.
    #[serde(default = "default_max_slippage")]
    pub max_slippage: Decimal,
    /// Maximum fractional deviation tolerated between live price and hint.
    #[serde(default = "default_max_price_deviation")]
    pub max_price_deviation: Decimal,
    /// Minimum seconds between accepted entries on one instrument.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Base legs permitted for new entries; empty means allow all.
    #[serde(default)]
    pub allowed_bases: HashSet<String>,
    /// Decimal places order quantities are rounded down to.
    #[serde(default = "default_quantity_precision")]
    pub quantity_precision: u32,
}

impl Default for EntrySettings {
    fn default() -> Self {
        Self {
            max_notional: default_max_notional(),
            cash_fraction_cap: None,
            max_slippage: default_max_slippage(),
            max_price_deviation: default_max_price_deviation(),
            cooldown_secs: default_cooldown_secs(),
            allowed_bases: HashSet::new(),
            quantity_precision: default_quantity_precision(),
        }
    }
}

impl EntrySettings {
    /// The cooldown window as a duration.
    #[must_use]
    pub const fn cooldown_window(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    /// Whether the instrument's base leg may be entered.
    #[must_use]
    pub fn base_allowed(&self, base: &str) -> bool {
        self.allowed_bases.is_empty() || self.allowed_bases.contains(base)
    }
}

/// Take-profit ladder and stop geometry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitSettings {
    /// First tier fractional offset above reference.
    #[serde(default = "default_tp1_offset")]
    pub tp1_offset: Decimal,
    /// Fraction of the fill sold at the first tier.
    #[serde(default = "default_tp_fraction")]
    pub tp1_fraction: Decimal,
    /// Second tier fractional offset above reference.
    #[serde(default = "default_tp2_offset")]
    pub tp2_offset: Decimal,
    /// Fraction of the fill sold at the second tier.
    #[serde(default = "default_tp_fraction")]
    pub tp2_fraction: Decimal,
    /// Stop trigger fractional offset below reference.
    #[serde(default = "default_stop_offset")]
    pub stop_offset: Decimal,
    /// Stop limit fractional offset below the trigger.
    #[serde(default = "default_stop_limit_slip")]
    pub stop_limit_slip: Decimal,
    /// Decimal places quantities are rounded down to.
    #[serde(default = "default_quantity_precision")]
    pub quantity_precision: u32,
    /// Smallest order quantity the broker accepts.
    #[serde(default = "default_min_quantity")]
    pub min_quantity: Decimal,
}

impl Default for ExitSettings {
    fn default() -> Self {
        Self {
            tp1_offset: default_tp1_offset(),
            tp1_fraction: default_tp_fraction(),
            tp2_offset: default_tp2_offset(),
            tp2_fraction: default_tp_fraction(),
            stop_offset: default_stop_offset(),
            stop_limit_slip: default_stop_limit_slip(),
            quantity_precision: default_quantity_precision(),
            min_quantity: default_min_quantity(),
        }
    }
}

impl ExitSettings {
    /// Convert to the domain ladder configuration.
    #[must_use]
    pub fn to_ladder_config(&self) -> LadderConfig {
        LadderConfig {
            tiers: vec![
                TierSpec {
                    name: "tp1",
                    offset: self.tp1_offset,
                    fraction: self.tp1_fraction,
                },
                TierSpec {
                    name: "tp2",
                    offset: self.tp2_offset,
                    fraction: self.tp2_fraction,
                },
            ],
            stop_offset: self.stop_offset,
            stop_limit_slip: self.stop_limit_slip,
            quantity_precision: self.quantity_precision,
            min_quantity: self.min_quantity,
        }
    }
}

/// Daily risk governor limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSettings {
    /// Daily P&L at or above which trading halts for the day.
    #[serde(default = "default_daily_profit_target")]
    pub daily_profit_target: Decimal,
    /// Daily loss (positive number) at or beyond which trading halts.
    #[serde(default = "default_daily_loss_limit")]
    pub daily_loss_limit: Decimal,
    /// Maximum accepted entries per day.
    #[serde(default = "default_max_trades_per_day")]
    pub max_trades_per_day: u32,
    /// Maximum attributed losing closes per day.
    #[serde(default = "default_max_losers_per_day")]
    pub max_losers_per_day: u32,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            daily_profit_target: default_daily_profit_target(),
            daily_loss_limit: default_daily_loss_limit(),
            max_trades_per_day: default_max_trades_per_day(),
            max_losers_per_day: default_max_losers_per_day(),
        }
    }
}

/// Fill observation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillSettings {
    /// Milliseconds between fill polls.
    #[serde(default = "default_fill_poll_ms")]
    pub poll_interval_ms: u64,
    /// Maximum polls before declaring a fill timeout.
    #[serde(default = "default_fill_max_polls")]
    pub max_polls: u32,
}

impl Default for FillSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_fill_poll_ms(),
            max_polls: default_fill_max_polls(),
        }
    }
}

impl FillSettings {
    /// The poll interval as a duration.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Reconciler cadence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerSettings {
    /// Seconds between reconciliation cycles.
    #[serde(default = "default_reconcile_secs")]
    pub interval_secs: u64,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_reconcile_secs(),
        }
    }
}

impl ReconcilerSettings {
    /// The cycle period as a duration.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Complete engine settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Entry gating and sizing.
    #[serde(default)]
    pub entry: EntrySettings,
    /// Exit ladder geometry.
    #[serde(default)]
    pub exits: ExitSettings,
    /// Daily risk limits.
    #[serde(default)]
    pub risk: RiskSettings,
    /// Fill observation.
    #[serde(default)]
    pub fill: FillSettings,
    /// Reconciler cadence.
    #[serde(default)]
    pub reconciler: ReconcilerSettings,
}

impl Settings {
    /// Defaults overlaid with environment overrides.
    ///
    /// Unparseable values are ignored with a warning rather than aborting
    /// startup.
    #[must_use]
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Some(v) = env_parse::<Decimal>("MAX_POSITION_DOLLARS") {
            settings.entry.max_notional = v;
        }
        if let Some(v) = env_parse::<Decimal>("CASH_FRACTION_CAP") {
            settings.entry.cash_fraction_cap = Some(v);
        }
        if let Some(v) = env_parse::<Decimal>("MAX_ENTRY_SLIPPAGE") {
            settings.entry.max_slippage = v;
        }
        if let Some(v) = env_parse::<Decimal>("MAX_PRICE_DEVIATION") {
            settings.entry.max_price_deviation = v;
        }
        if let Some(v) = env_parse::<u64>("COOLDOWN_SECS") {
            settings.entry.cooldown_secs = v;
        }
        if let Ok(raw) = std::env::var("ALLOWED_BASES") {
            settings.entry.allowed_bases = raw
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = env_parse::<Decimal>("DAILY_PROFIT_TARGET") {
            settings.risk.daily_profit_target = v;
        }
        if let Some(v) = env_parse::<Decimal>("DAILY_LOSS_LIMIT") {
            settings.risk.daily_loss_limit = v;
        }
        if let Some(v) = env_parse::<u32>("MAX_TRADES_PER_DAY") {
            settings.risk.max_trades_per_day = v;
        }
        if let Some(v) = env_parse::<u32>("MAX_LOSERS_PER_DAY") {
            settings.risk.max_losers_per_day = v;
        }
        if let Some(v) = env_parse::<u64>("FILL_POLL_MS") {
            settings.fill.poll_interval_ms = v;
        }
        if let Some(v) = env_parse::<u32>("FILL_MAX_POLLS") {
            settings.fill.max_polls = v;
        }
        if let Some(v) = env_parse::<u64>("RECONCILE_INTERVAL_SECS") {
            settings.reconciler.interval_secs = v;
        }

        settings
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}

fn default_max_notional() -> Decimal {
    Decimal::new(500, 0)
}

fn default_max_slippage() -> Decimal {
    Decimal::new(2, 3) // 0.2%
}

fn default_max_price_deviation() -> Decimal {
    Decimal::new(25, 4) // 0.25%
}

const fn default_cooldown_secs() -> u64 {
    300
}

const fn default_quantity_precision() -> u32 {
    9
}

fn default_tp1_offset() -> Decimal {
    Decimal::new(6, 3) // +0.6%
}

fn default_tp2_offset() -> Decimal {
    Decimal::new(12, 3) // +1.2%
}

fn default_tp_fraction() -> Decimal {
    Decimal::new(4, 1) // 40%
}

fn default_stop_offset() -> Decimal {
    Decimal::new(9, 3) // -0.9%
}

fn default_stop_limit_slip() -> Decimal {
    Decimal::new(15, 4) // -0.15%
}

fn default_min_quantity() -> Decimal {
    Decimal::new(1, 9)
}

fn default_daily_profit_target() -> Decimal {
    Decimal::new(150, 0)
}

fn default_daily_loss_limit() -> Decimal {
    Decimal::new(100, 0)
}

const fn default_max_trades_per_day() -> u32 {
    10
}

const fn default_max_losers_per_day() -> u32 {
    3
}

const fn default_fill_poll_ms() -> u64 {
    500
}

const fn default_fill_max_polls() -> u32 {
    12
}

const fn default_reconcile_secs() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults_are_coherent() {
        let settings = Settings::default();
        assert_eq!(settings.entry.max_notional, dec!(500));
        assert_eq!(settings.entry.max_slippage, dec!(0.002));
        assert_eq!(settings.entry.max_price_deviation, dec!(0.0025));
        assert_eq!(settings.entry.cooldown_window(), Duration::from_secs(300));
        assert_eq!(settings.reconciler.interval(), Duration::from_secs(5));
        assert_eq!(settings.fill.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn empty_allow_set_allows_all() {
        let settings = EntrySettings::default();
        assert!(settings.base_allowed("BTC"));
        assert!(settings.base_allowed("ANYTHING"));
    }

    #[test]
    fn allow_set_restricts_bases() {
        let settings = EntrySettings {
            allowed_bases: ["BTC".to_string(), "ETH".to_string()].into_iter().collect(),
            ..EntrySettings::default()
        };
        assert!(settings.base_allowed("BTC"));
        assert!(!settings.base_allowed("DOGE"));
    }

    #[test]
    fn ladder_config_mirrors_exit_settings() {
        let ladder = ExitSettings::default().to_ladder_config();
        assert_eq!(ladder.tiers.len(), 2);
        assert_eq!(ladder.tiers[0].name, "tp1");
        assert_eq!(ladder.tiers[0].offset, dec!(0.006));
        assert_eq!(ladder.tiers[1].fraction, dec!(0.4));
        assert_eq!(ladder.stop_offset, dec!(0.009));
        assert_eq!(ladder.stop_limit_slip, dec!(0.0015));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"entry": {"max_notional": "1000"}}"#).unwrap();
        assert_eq!(settings.entry.max_notional, dec!(1000));
        assert_eq!(settings.entry.cooldown_secs, 300);
        assert_eq!(settings.risk.max_trades_per_day, 10);
    }
}
