//! Take-profit ladder and protective stop derivation.
//!
//! Pure price/quantity math: given a filled quantity and a reference price,
//! derive the ladder of take-profit tiers and the stop-limit leg. No broker
//! interaction happens here; placement lives in the application layer.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use super::instrument::Instrument;

/// Specification for one take-profit tier.
#[derive(Debug, Clone)]
pub struct TierSpec {
    /// Tier name used as the registry key ("tp1", "tp2").
    pub name: &'static str,
    /// Positive fractional price offset above the reference (0.006 = +0.6%).
    pub offset: Decimal,
    /// Fraction of the filled quantity allocated to this tier.
    pub fraction: Decimal,
}

/// Ladder configuration: ordered take-profit tiers plus the stop geometry.
#[derive(Debug, Clone)]
pub struct LadderConfig {
    /// Ordered take-profit tiers.
    pub tiers: Vec<TierSpec>,
    /// Positive fractional offset of the stop trigger below the reference.
    pub stop_offset: Decimal,
    /// Additional fractional offset of the stop limit below the trigger.
    ///
    /// Keeps the stop marketable once triggered without guaranteeing the
    /// execution price.
    pub stop_limit_slip: Decimal,
    /// Decimal places quantities are rounded down to.
    pub quantity_precision: u32,
    /// Smallest quantity the broker will accept; smaller tiers are omitted.
    pub min_quantity: Decimal,
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            tiers: vec![
                TierSpec {
                    name: "tp1",
                    offset: Decimal::new(6, 3),    // +0.6%
                    fraction: Decimal::new(4, 1),  // 40%
                },
                TierSpec {
                    name: "tp2",
                    offset: Decimal::new(12, 3),   // +1.2%
                    fraction: Decimal::new(4, 1),  // 40%
                },
            ],
            stop_offset: Decimal::new(9, 3),       // -0.9%
            stop_limit_slip: Decimal::new(15, 4),  // -0.15% below trigger
            quantity_precision: 9,
            min_quantity: Decimal::new(1, 9),
        }
    }
}

/// One sized take-profit tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TakeProfitTier {
    /// Tier name ("tp1", "tp2").
    pub name: String,
    /// Limit price.
    pub price: Decimal,
    /// Quantity to sell at this tier.
    pub quantity: Decimal,
}

/// The protective stop-limit leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopLeg {
    /// Price at which the stop arms.
    pub trigger_price: Decimal,
    /// Executable limit price once armed, below the trigger.
    pub limit_price: Decimal,
    /// Quantity to sell.
    pub quantity: Decimal,
}

/// A complete exit plan for one filled entry.
#[derive(Debug, Clone, Serialize)]
pub struct ExitPlan {
    /// Instrument the plan protects.
    pub instrument: Instrument,
    /// Sized take-profit tiers, in ladder order. Degenerate tiers omitted.
    pub take_profits: Vec<TakeProfitTier>,
    /// The stop leg; `None` only when the whole quantity is sub-minimum.
    pub stop: Option<StopLeg>,
    /// True when raw tier quantities exceeded the fill and were scaled down.
    pub scaled_down: bool,
}

impl ExitPlan {
    /// Total quantity listed across take-profit tiers.
    #[must_use]
    pub fn listed_quantity(&self) -> Decimal {
        self.take_profits.iter().map(|t| t.quantity).sum()
    }
}

fn round_down(value: Decimal, precision: u32) -> Decimal {
    value.round_dp_with_strategy(precision, RoundingStrategy::ToZero)
}

/// Derive the stop leg alone.
///
/// The reconciler uses this to re-arm or resize a stop from a fresh
/// reference price without recomputing the take-profit ladder.
#[must_use]
pub fn build_stop(config: &LadderConfig, quantity: Decimal, reference_price: Decimal) -> Option<StopLeg> {
    let quantity = round_down(quantity, config.quantity_precision);
    if quantity < config.min_quantity {
        return None;
    }

    let trigger_price = reference_price * (Decimal::ONE - config.stop_offset);
    let limit_price = trigger_price * (Decimal::ONE - config.stop_limit_slip);

    Some(StopLeg {
        trigger_price,
        limit_price,
        quantity,
    })
}

/// Derive the full exit plan for a filled entry.
///
/// Tier quantities are `fraction × quantity` rounded down to the configured
/// precision. If the raw tier quantities sum to more than the filled
/// quantity, all tiers are scaled down proportionally so the ladder can
/// never sell more than was bought. Tiers that end up below the broker
/// minimum are omitted rather than submitted as zero.
#[must_use]
pub fn build_plan(
    config: &LadderConfig,
    instrument: Instrument,
    quantity: Decimal,
    reference_price: Decimal,
) -> ExitPlan {
    let mut raw: Vec<(String, Decimal, Decimal)> = config
        .tiers
        .iter()
        .map(|tier| {
            let price = reference_price * (Decimal::ONE + tier.offset);
            let qty = round_down(tier.fraction * quantity, config.quantity_precision);
            (tier.name.to_string(), price, qty)
        })
        .collect();

    let raw_sum: Decimal = raw.iter().map(|(_, _, q)| *q).sum();
    let scaled_down = raw_sum > quantity && raw_sum > Decimal::ZERO;
    if scaled_down {
        let scale = quantity / raw_sum;
        for (_, _, qty) in &mut raw {
            *qty = round_down(*qty * scale, config.quantity_precision);
        }
    }

    let take_profits = raw
        .into_iter()
        .filter(|(_, _, qty)| *qty >= config.min_quantity)
        .map(|(name, price, quantity)| TakeProfitTier {
            name,
            price,
            quantity,
        })
        .collect();

    ExitPlan {
        instrument,
        take_profits,
        stop: build_stop(config, quantity, reference_price),
        scaled_down,
    }
}
