//! Outbound response bodies: status-plus-reason mirrors of engine outcomes.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::application::{EngineError, EntryOutcome, ManualExitOutcome, Protection};
use crate::domain::exit_plan::{StopLeg, TakeProfitTier};
use crate::domain::RiskSnapshot;

/// Health probe body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always "ok" when the process is serving.
    pub status: String,
    /// "paper" or "live".
    pub environment: String,
}

/// Read-only engine status.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// "paper" or "live".
    pub environment: String,
    /// Daily risk counters and the halt flag.
    pub risk: RiskSnapshot,
    /// Instruments with registered protective orders.
    pub monitored_instruments: usize,
}

/// Envelope for a processed signal.
#[derive(Debug, Serialize)]
pub struct SignalResponse {
    /// False only for faults; skips are ok=true with a reason.
    pub ok: bool,
    /// Canonical instrument.
    pub instrument: String,
    /// The normalized signal.
    pub signal: String,
    /// The engine outcome.
    pub result: OutcomeBody,
}

/// Rejection envelope for malformed requests.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Always false.
    pub ok: bool,
    /// What was wrong with the request.
    pub error: String,
}

/// Flattened outcome body.
#[derive(Debug, Default, Serialize)]
pub struct OutcomeBody {
    /// "submitted", "submitted_no_exits", "submitted_exits_incomplete",
    /// "skipped", or "error".
    pub status: String,
    /// Why, for skips and errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Broker order id of the entry or liquidation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    /// Submitted quantity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    /// Submitted IOC limit price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
    /// Placed take-profit tiers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profits: Option<Vec<TakeProfitTier>>,
    /// Placed protective stop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopLeg>,
}

impl From<EntryOutcome> for OutcomeBody {
    fn from(outcome: EntryOutcome) -> Self {
        match outcome {
            EntryOutcome::Skipped(reason) => Self {
                status: "skipped".to_string(),
                reason: Some(reason.to_string()),
                ..Self::default()
            },
            EntryOutcome::Submitted {
                order_id,
                quantity,
                limit_price,
                protection,
            } => {
                let base = Self {
                    order_id: Some(order_id),
                    quantity: Some(quantity),
                    limit_price: Some(limit_price),
                    ..Self::default()
                };
                match protection {
                    Protection::Placed { plan } => Self {
                        status: "submitted".to_string(),
                        take_profits: Some(plan.take_profits),
                        stop: plan.stop,
                        ..base
                    },
                    Protection::FillTimeout => Self {
                        status: "submitted_no_exits".to_string(),
                        reason: Some("fill not observed within the poll budget".to_string()),
                        ..base
                    },
                    Protection::Incomplete { placed, error } => Self {
                        status: "submitted_exits_incomplete".to_string(),
                        reason: Some(format!("{placed} exit orders placed before failure: {error}")),
                        ..base
                    },
                }
            }
        }
    }
}

impl From<ManualExitOutcome> for OutcomeBody {
    fn from(outcome: ManualExitOutcome) -> Self {
        match outcome {
            ManualExitOutcome::Skipped { reason } => Self {
                status: "skipped".to_string(),
                reason: Some(reason),
                ..Self::default()
            },
            ManualExitOutcome::Submitted {
                order_id,
                quantity,
                limit_price,
            } => Self {
                status: "submitted".to_string(),
                order_id: Some(order_id),
                quantity: Some(quantity),
                limit_price: Some(limit_price),
                ..Self::default()
            },
        }
    }
}

impl From<&EngineError> for OutcomeBody {
    fn from(error: &EngineError) -> Self {
        Self {
            status: "error".to_string(),
            reason: Some(error.to_string()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::SkipReason;
    use rust_decimal_macros::dec;

    #[test]
    fn skip_body_carries_reason() {
        let body: OutcomeBody = EntryOutcome::Skipped(SkipReason::NotAllowed).into();
        assert_eq!(body.status, "skipped");
        assert_eq!(body.reason.as_deref(), Some("symbol not allowed"));
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("order_id").is_none());
    }

    #[test]
    fn fill_timeout_is_distinct_from_success() {
        let body: OutcomeBody = EntryOutcome::Submitted {
            order_id: "o1".to_string(),
            quantity: dec!(1),
            limit_price: dec!(100.2),
            protection: Protection::FillTimeout,
        }
        .into();
        assert_eq!(body.status, "submitted_no_exits");
        assert_eq!(body.order_id.as_deref(), Some("o1"));
    }

    #[test]
    fn error_body_is_status_plus_reason() {
        let body: OutcomeBody = (&EngineError::PriceUnavailable).into();
        assert_eq!(body.status, "error");
        assert!(body.reason.unwrap().contains("no usable price"));
    }
}
