//! Domain layer: value objects and ledgers with no external dependencies.

pub mod cooldown;
pub mod exit_plan;
pub mod exit_registry;
pub mod instrument;
pub mod risk_ledger;

pub use cooldown::CooldownLedger;
pub use exit_plan::{ExitPlan, LadderConfig, StopLeg, TakeProfitTier, TierSpec};
pub use exit_registry::{ExitEntry, ExitRegistry, StopRecord};
pub use instrument::{Instrument, InstrumentError};
pub use risk_ledger::{DailyRiskLedger, RiskSnapshot, trading_day};
