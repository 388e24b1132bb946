//! Registry of live protective orders per instrument.

use std::collections::HashMap;

use rust_decimal::Decimal;

use super::instrument::Instrument;

/// The registered protective stop for one instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopRecord {
    /// Broker order id of the live stop.
    pub order_id: String,
    /// Quantity the stop was sized to when submitted.
    pub quantity: Decimal,
    /// Trigger price, kept for close attribution.
    pub trigger_price: Decimal,
}

/// Registered exit orders for one instrument.
#[derive(Debug, Clone, Default)]
pub struct ExitEntry {
    /// Tier name → broker order id for resting take-profits.
    pub take_profits: Vec<(String, String)>,
    /// The single live protective stop, when one is armed.
    pub stop: Option<StopRecord>,
}

impl ExitEntry {
    /// All broker order ids in this entry, take-profits first.
    #[must_use]
    pub fn order_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.take_profits.iter().map(|(_, id)| id.clone()).collect();
        if let Some(stop) = &self.stop {
            ids.push(stop.order_id.clone());
        }
        ids
    }

    /// Whether the entry holds no orders at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.take_profits.is_empty() && self.stop.is_none()
    }
}

/// Instrument → active protective orders.
///
/// Written by the exit planner, stop-swapped by the reconciler, cleared on
/// flat or manual exit. Each instrument holds at most one stop record at
/// any time; [`ExitRegistry::replace_stop`] returns the displaced record so
/// the caller can cancel it at the broker.
#[derive(Debug, Default)]
pub struct ExitRegistry {
    entries: HashMap<Instrument, ExitEntry>,
}

impl ExitRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Instruments currently holding registered exits.
    #[must_use]
    pub fn instruments(&self) -> Vec<Instrument> {
        self.entries.keys().cloned().collect()
    }

    /// Look up the entry for an instrument.
    #[must_use]
    pub fn get(&self, instrument: &Instrument) -> Option<&ExitEntry> {
        self.entries.get(instrument)
    }

    /// Record a freshly placed take-profit order.
    pub fn add_take_profit(&mut self, instrument: &Instrument, tier: impl Into<String>, order_id: impl Into<String>) {
        self.entries
            .entry(instrument.clone())
            .or_default()
            .take_profits
            .push((tier.into(), order_id.into()));
    }

    /// Install a stop record, returning the one it displaces (if any).
    pub fn replace_stop(&mut self, instrument: &Instrument, stop: StopRecord) -> Option<StopRecord> {
        self.entries
            .entry(instrument.clone())
            .or_default()
            .stop
            .replace(stop)
    }

    /// The live stop record for an instrument.
    #[must_use]
    pub fn stop(&self, instrument: &Instrument) -> Option<&StopRecord> {
        self.entries.get(instrument).and_then(|e| e.stop.as_ref())
    }

    /// Remove and return everything registered for an instrument.
    pub fn remove(&mut self, instrument: &Instrument) -> Option<ExitEntry> {
        self.entries.remove(instrument)
    }

    /// Number of instruments with registered exits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn btc() -> Instrument {
        Instrument::parse("BTC/USD").unwrap()
    }

    fn stop(id: &str, qty: Decimal) -> StopRecord {
        StopRecord {
            order_id: id.to_string(),
            quantity: qty,
            trigger_price: dec!(99.10),
        }
    }

    #[test]
    fn at_most_one_stop_per_instrument() {
        let mut registry = ExitRegistry::new();
        assert!(registry.replace_stop(&btc(), stop("s1", dec!(10))).is_none());

        let displaced = registry.replace_stop(&btc(), stop("s2", dec!(6))).unwrap();
        assert_eq!(displaced.order_id, "s1");
        assert_eq!(registry.stop(&btc()).unwrap().order_id, "s2");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn order_ids_cover_ladder_and_stop() {
        let mut registry = ExitRegistry::new();
        registry.add_take_profit(&btc(), "tp1", "o1");
        registry.add_take_profit(&btc(), "tp2", "o2");
        registry.replace_stop(&btc(), stop("o3", dec!(10)));

        let entry = registry.remove(&btc()).unwrap();
        assert_eq!(entry.order_ids(), vec!["o1", "o2", "o3"]);
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_on_unknown_instrument_is_none() {
        let mut registry = ExitRegistry::new();
        assert!(registry.remove(&btc()).is_none());
    }
}
