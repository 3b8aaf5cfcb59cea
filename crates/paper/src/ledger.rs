use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use common::{Operation, Outcome, SetupClass};

/// One registered operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub registered_at: DateTime<Utc>,
    pub operation: Operation,
}

/// Append-only record of operations. Entries are never mutated once stored.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a copy of `operation` stamped with the current time.
    pub fn record(&mut self, operation: Operation) -> &LedgerEntry {
        self.record_at(operation, Utc::now())
    }

    pub fn record_at(&mut self, operation: Operation, registered_at: DateTime<Utc>) -> &LedgerEntry {
        info!(
            outcome = ?operation.outcome,
            direction = %operation.direction,
            entry = operation.entry_price,
            pips = operation.pips,
            setup = ?operation.setup_class(),
            "Operation registered"
        );
        self.entries.push(LedgerEntry { registered_at, operation });
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn statistics(&self) -> Statistics {
        let mut stats = Statistics::default();
        let mut gross_win = 0.0;
        let mut gross_loss = 0.0;

        for entry in &self.entries {
            let op = &entry.operation;
            stats.total += 1;
            let class = stats.by_setup.entry(op.setup_class()).or_default();
            class.total += 1;
            match op.outcome {
                Outcome::Win => {
                    stats.wins += 1;
                    class.wins += 1;
                    gross_win += op.stop_distance * op.rr_ratio;
                }
                Outcome::Loss => {
                    stats.losses += 1;
                    class.losses += 1;
                    gross_loss += op.stop_distance;
                }
                Outcome::Pending => {
                    stats.pending += 1;
                    class.pending += 1;
                }
            }
        }

        if stats.total > 0 {
            stats.win_rate = Some(stats.wins as f64 / stats.total as f64 * 100.0);
            stats.profit_factor = Some(if gross_loss > 0.0 {
                gross_win / gross_loss
            } else {
                f64::INFINITY
            });
        }
        stats
    }
}

/// Win/loss tally for one setup class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassStats {
    pub total: usize,
    pub wins: usize,
    pub losses: usize,
    pub pending: usize,
}

impl ClassStats {
    pub fn win_rate(&self) -> Option<f64> {
        (self.total > 0).then(|| self.wins as f64 / self.total as f64 * 100.0)
    }
}

/// Aggregate performance over the ledger. Rates are `None` for an empty ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total: usize,
    pub wins: usize,
    pub losses: usize,
    pub pending: usize,
    /// Wins over all registered operations, in percent.
    pub win_rate: Option<f64>,
    /// Σ(stop distance × RR) over wins / Σ stop distance over losses.
    /// Infinite when there are no losses.
    pub profit_factor: Option<f64>,
    pub by_setup: BTreeMap<SetupClass, ClassStats>,
}

impl std::fmt::Display for Statistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Total operations: {}", self.total)?;
        if let (Some(win_rate), Some(pf)) = (self.win_rate, self.profit_factor) {
            writeln!(f, "Wins: {}  Losses: {}  Pending: {}", self.wins, self.losses, self.pending)?;
            writeln!(f, "Win rate: {win_rate:.1}%")?;
            writeln!(f, "Profit factor: {pf:.2}")?;
            for (class, s) in &self.by_setup {
                write!(f, "  {class:?}: {} ops, {} W / {} L / {} P", s.total, s.wins, s.losses, s.pending)?;
                match s.win_rate() {
                    Some(rate) => writeln!(f, " ({rate:.1}%)")?,
                    None => writeln!(f)?,
                }
            }
        }
        Ok(())
    }
}
