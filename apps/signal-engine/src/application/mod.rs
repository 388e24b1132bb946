//! Application layer: orchestration of the trade lifecycle.

pub mod entry;
pub mod exit_planner;
pub mod fill_observer;
pub mod governor;
pub mod manual_exit;
pub mod ports;
pub mod reconciler;
pub mod recovery;
pub mod state;

pub use entry::{EntryExecutor, EntryOutcome, Protection, SkipReason};
pub use exit_planner::{ExitPlacementError, ExitPlanner};
pub use fill_observer::FillObserver;
pub use governor::{GateDecision, RiskGovernor};
pub use manual_exit::{ManualExitExecutor, ManualExitOutcome};
pub use reconciler::Reconciler;
pub use state::EngineState;

use self::ports::BrokerError;

/// Faults the lifecycle operations can surface to the ingress layer.
///
/// Decisions (gate rejections, cooldowns, fill timeouts, "no position")
/// are structured outcomes on the operation result types, never errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Neither a live price nor a hint was available.
    #[error("no usable price: live source empty and no hint supplied")]
    PriceUnavailable,

    /// A broker call failed.
    #[error(transparent)]
    Broker(#[from] BrokerError),
}
