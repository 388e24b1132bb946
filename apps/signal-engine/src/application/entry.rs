//! Entry execution: gates, sizing, submission, fill, protection.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::config::EntrySettings;
use crate::domain::{ExitPlan, Instrument};

use super::exit_planner::{ExitPlanner, cancel_quietly};
use super::fill_observer::FillObserver;
use super::governor::RiskGovernor;
use super::ports::{BrokerPort, OrderSide, SubmitOrderRequest, TimeInForce};
use super::state::EngineState;
use super::EngineError;

/// Why an entry was declined. These are decisions, not faults.
#[derive(Debug, Clone)]
pub enum SkipReason {
    /// The daily risk governor has halted trading.
    RiskHalted {
        /// The governor's stored reason.
        reason: String,
    },
    /// The instrument's base leg is not in the allow-set.
    NotAllowed,
    /// The per-instrument cooldown has not elapsed.
    Cooldown {
        /// Time left before the next entry is permitted.
        remaining: Duration,
    },
    /// A non-zero position already exists; no pyramiding.
    AlreadyLong {
        /// The live position quantity.
        quantity: Decimal,
    },
    /// Live price and hint disagree beyond the configured tolerance.
    PriceDeviation {
        /// The live trade price.
        live: Decimal,
        /// The caller-supplied hint.
        hint: Decimal,
        /// `|live − hint| / live`.
        deviation: Decimal,
    },
    /// The sized quantity rounded to nothing.
    BelowMinimum,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RiskHalted { reason } => write!(f, "risk halted: {reason}"),
            Self::NotAllowed => write!(f, "symbol not allowed"),
            Self::Cooldown { remaining } => {
                write!(f, "cooldown: {}s remaining", remaining.as_secs())
            }
            Self::AlreadyLong { quantity } => write!(f, "already long {quantity}"),
            Self::PriceDeviation { deviation, .. } => {
                write!(f, "price deviation {deviation} exceeds tolerance")
            }
            Self::BelowMinimum => write!(f, "sized quantity below minimum"),
        }
    }
}

/// How well-protected the submitted entry ended up.
#[derive(Debug)]
pub enum Protection {
    /// Fill observed and the full exit plan is live.
    Placed {
        /// The placed plan.
        plan: ExitPlan,
    },
    /// The fill never became visible inside the poll budget. The position,
    /// if it exists, is unprotected until the reconciler or a retry
    /// catches it.
    FillTimeout,
    /// The fill was observed but exit placement failed partway.
    Incomplete {
        /// Orders that did get placed and registered.
        placed: usize,
        /// The underlying failure.
        error: String,
    },
}

/// Outcome of an entry request.
#[derive(Debug)]
pub enum EntryOutcome {
    /// A gate declined the entry.
    Skipped(SkipReason),
    /// The entry order was accepted by the broker.
    Submitted {
        /// Broker order id of the entry.
        order_id: String,
        /// Submitted quantity.
        quantity: Decimal,
        /// IOC limit price.
        limit_price: Decimal,
        /// Protection status after fill observation.
        protection: Protection,
    },
}

/// Orchestrates a signal into a protected position.
pub struct EntryExecutor<B: BrokerPort> {
    broker: Arc<B>,
    state: Arc<EngineState>,
    governor: Arc<RiskGovernor<B>>,
    fill_observer: FillObserver<B>,
    exit_planner: ExitPlanner<B>,
    settings: EntrySettings,
}

impl<B: BrokerPort> EntryExecutor<B> {
    /// Wire an executor from its collaborators.
    pub fn new(
        broker: Arc<B>,
        state: Arc<EngineState>,
        governor: Arc<RiskGovernor<B>>,
        fill_observer: FillObserver<B>,
        exit_planner: ExitPlanner<B>,
        settings: EntrySettings,
    ) -> Self {
        Self {
            broker,
            state,
            governor,
            fill_observer,
            exit_planner,
            settings,
        }
    }

    /// Execute a buy signal end to end.
    ///
    /// Gates run in fixed order (governor, allow-set, cooldown,
    /// already-long), each declining with a structured skip rather than an
    /// error. After submission the call blocks on fill observation and
    /// exit placement; callers must treat entry as a slow synchronous
    /// operation.
    ///
    /// # Errors
    ///
    /// `EngineError::PriceUnavailable` when neither live price nor hint
    /// exists; `EngineError::Broker` when submission itself fails.
    pub async fn enter(
        &self,
        instrument: Instrument,
        price_hint: Option<Decimal>,
    ) -> Result<EntryOutcome, EngineError> {
        let gate = self.governor.evaluate_gate().await?;
        if !gate.allow {
            return Ok(EntryOutcome::Skipped(SkipReason::RiskHalted {
                reason: gate.reason.unwrap_or_else(|| "disabled".to_string()),
            }));
        }

        if !self.settings.base_allowed(instrument.base()) {
            return Ok(EntryOutcome::Skipped(SkipReason::NotAllowed));
        }

        {
            let cooldowns = self.state.cooldowns.lock().await;
            if let Some(remaining) = cooldowns.remaining(
                &instrument,
                self.settings.cooldown_window(),
                Instant::now(),
            ) {
                return Ok(EntryOutcome::Skipped(SkipReason::Cooldown { remaining }));
            }
        }

        if let Some(quantity) = self.broker.get_position(&instrument).await?
            && quantity > Decimal::ZERO
        {
            return Ok(EntryOutcome::Skipped(SkipReason::AlreadyLong { quantity }));
        }

        let reference_price = match self.resolve_price(&instrument, price_hint).await? {
            Ok(price) => price,
            Err(skip) => return Ok(EntryOutcome::Skipped(skip)),
        };

        let notional = self.entry_notional().await?;
        let limit_price = reference_price * (Decimal::ONE + self.settings.max_slippage);
        let quantity = (notional / limit_price)
            .round_dp_with_strategy(self.settings.quantity_precision, RoundingStrategy::ToZero);
        if quantity <= Decimal::ZERO {
            return Ok(EntryOutcome::Skipped(SkipReason::BelowMinimum));
        }

        // Orphaned protective orders from an earlier, incompletely cleaned
        // cycle would fight the new position; clear them before buying.
        let stale = {
            let mut exits = self.state.exits.lock().await;
            exits.remove(&instrument)
        };
        if let Some(stale) = stale {
            tracing::warn!(
                instrument = %instrument,
                orders = stale.order_ids().len(),
                "Clearing stale exit orders before entry"
            );
            for order_id in stale.order_ids() {
                cancel_quietly(self.broker.as_ref(), &order_id).await;
            }
        }

        let request = SubmitOrderRequest::limit(
            Uuid::new_v4().to_string(),
            instrument.clone(),
            OrderSide::Buy,
            quantity,
            limit_price,
            TimeInForce::Ioc,
        );
        let ack = self.broker.submit_order(request).await?;
        tracing::info!(
            instrument = %instrument,
            order_id = %ack.broker_order_id,
            quantity = %quantity,
            limit_price = %limit_price,
            "Entry submitted"
        );

        // Frequency is bounded at submission time, not fill time.
        {
            let mut cooldowns = self.state.cooldowns.lock().await;
            cooldowns.note_entry(instrument.clone(), Instant::now());
        }
        self.governor.record_trade_opened().await;

        let protection = match self.fill_observer.await_fill(&instrument).await {
            None => Protection::FillTimeout,
            Some((filled_quantity, fill_reference)) => {
                match self
                    .exit_planner
                    .plan_and_place(&instrument, filled_quantity, fill_reference)
                    .await
                {
                    Ok(plan) => Protection::Placed { plan },
                    Err(e) => {
                        tracing::error!(
                            instrument = %instrument,
                            error = %e,
                            "Position open with incomplete exits"
                        );
                        Protection::Incomplete {
                            placed: e.placed,
                            error: e.source.to_string(),
                        }
                    }
                }
            }
        };

        Ok(EntryOutcome::Submitted {
            order_id: ack.broker_order_id,
            quantity,
            limit_price,
            protection,
        })
    }

    /// Resolve the entry reference price from the live source and the hint.
    ///
    /// A transport failure on the live source counts as "unavailable" and
    /// falls back to the hint; only the total absence of both is a fault.
    async fn resolve_price(
        &self,
        instrument: &Instrument,
        hint: Option<Decimal>,
    ) -> Result<Result<Decimal, SkipReason>, EngineError> {
        let live = match self.broker.get_latest_trade(instrument).await {
            Ok(price) => price,
            Err(e) => {
                tracing::warn!(instrument = %instrument, error = %e, "Live price fetch failed");
                None
            }
        };

        match (live, hint) {
            (None, None) => Err(EngineError::PriceUnavailable),
            (Some(live), None) => Ok(Ok(live)),
            (None, Some(hint)) => Ok(Ok(hint)),
            (Some(live), Some(hint)) => {
                let deviation = ((live - hint).abs() / live).abs();
                if deviation > self.settings.max_price_deviation {
                    Ok(Err(SkipReason::PriceDeviation {
                        live,
                        hint,
                        deviation,
                    }))
                } else {
                    Ok(Ok(live))
                }
            }
        }
    }

    /// The notional to deploy, after the optional cash-fraction cap.
    async fn entry_notional(&self) -> Result<Decimal, EngineError> {
        let mut notional = self.settings.max_notional;
        if let Some(fraction) = self.settings.cash_fraction_cap {
            let account = self.broker.get_account().await?;
            notional = notional.min(fraction * account.cash);
        }
        Ok(notional)
    }
}
