//! Per-instrument entry cooldown tracking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::instrument::Instrument;

/// Last-accepted-entry timestamps per instrument.
///
/// Entries are overwritten on each accepted submission and never removed;
/// staleness is implicit once the age exceeds the cooldown window.
#[derive(Debug, Default)]
pub struct CooldownLedger {
    last_entry: HashMap<Instrument, Instant>,
}

impl CooldownLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp an accepted entry for the instrument.
    pub fn note_entry(&mut self, instrument: Instrument, at: Instant) {
        self.last_entry.insert(instrument, at);
    }

    /// Time left before the instrument may be entered again.
    ///
    /// `None` means the cooldown has elapsed (or the instrument was never
    /// entered).
    #[must_use]
    pub fn remaining(&self, instrument: &Instrument, window: Duration, now: Instant) -> Option<Duration> {
        let last = self.last_entry.get(instrument)?;
        let elapsed = now.saturating_duration_since(*last);
        window.checked_sub(elapsed).filter(|d| !d.is_zero())
    }

    /// Number of instruments ever stamped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.last_entry.len()
    }

    /// Whether no instrument has been stamped yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last_entry.is_empty()
    }
}
