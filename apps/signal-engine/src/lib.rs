// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Signal Engine - Rust Core Library
//!
//! Converts directional webhook signals into risk-managed broker
//! positions. Every accepted buy becomes a bounded-slippage IOC entry, a
//! fill observation, a take-profit ladder plus protective stop sized to
//! the actual fill, and continuous reconciliation of those protective
//! orders while the position lives.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: pure value objects and ledgers
//!   - `instrument`: canonical `BASE/QUOTE` identifiers
//!   - `exit_plan`: ladder/stop price and quantity math
//!   - `risk_ledger`, `cooldown`, `exit_registry`: the three ledgers
//!
//! - **Application**: lifecycle orchestration
//!   - `ports`: the `BrokerPort` seam
//!   - `governor`, `entry`, `fill_observer`, `exit_planner`,
//!     `reconciler`, `manual_exit`, `recovery`
//!   - `state`: the single owner of the shared ledgers
//!
//! - **Infrastructure**: adapters
//!   - `broker::alpaca`: Alpaca Markets REST adapter
//!   - `http`: webhook/health/status ingress

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Domain layer - value objects and ledgers with no external dependencies.
pub mod domain;

/// Application layer - lifecycle orchestration and port definitions.
pub mod application;

/// Infrastructure layer - adapters and external integrations.
pub mod infrastructure;

/// Engine settings.
pub mod config;

/// Tracing setup.
pub mod telemetry;

// Domain re-exports
pub use domain::{
    CooldownLedger, DailyRiskLedger, ExitPlan, ExitRegistry, Instrument, LadderConfig,
    RiskSnapshot, StopRecord,
};

// Application re-exports
pub use application::ports::{
    AccountSnapshot, BrokerError, BrokerPort, OpenOrder, OrderAck, OrderSide, OrderType,
    SubmitOrderRequest, TimeInForce,
};
pub use application::{
    EngineError, EngineState, EntryExecutor, EntryOutcome, FillObserver, GateDecision,
    ManualExitExecutor, ManualExitOutcome, Protection, Reconciler, RiskGovernor, SkipReason,
};

// Infrastructure re-exports
pub use infrastructure::broker::alpaca::{AlpacaBrokerAdapter, AlpacaConfig, AlpacaEnvironment};
pub use infrastructure::http::{AppState, create_router};
