//! Offline aggregation over stored analysis records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use common::{AnalysisRecord, Direction};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportSummary {
    pub analyses: usize,
    pub signals: usize,
    /// Signals per analysis, in percent. `None` without records.
    pub signal_rate: Option<f64>,
    pub first_analysis: Option<DateTime<Utc>>,
    pub last_analysis: Option<DateTime<Utc>>,
    pub by_bias: BTreeMap<String, usize>,
    pub by_decision: BTreeMap<String, usize>,
    pub by_opportunity: BTreeMap<String, usize>,
    pub by_entry_kind: BTreeMap<String, usize>,
    pub buys: usize,
    pub sells: usize,
    pub avg_stop_distance: Option<f64>,
}

/// Summarize `records` in any order.
pub fn consolidate(records: &[AnalysisRecord]) -> ReportSummary {
    let mut summary = ReportSummary { analyses: records.len(), ..ReportSummary::default() };
    let mut stop_total = 0.0;

    for record in records {
        let at = record.analyzed_at;
        summary.first_analysis = Some(summary.first_analysis.map_or(at, |t| t.min(at)));
        summary.last_analysis = Some(summary.last_analysis.map_or(at, |t| t.max(at)));

        if let Some(bias) = &record.bias {
            *summary.by_bias.entry(bias.bias.to_string()).or_default() += 1;
        }
        *summary.by_decision.entry(record.decision.label().to_string()).or_default() += 1;

        let Some(signal) = record.decision.signal() else {
            continue;
        };
        summary.signals += 1;
        stop_total += signal.stop_distance;
        *summary.by_opportunity.entry(signal.opportunity.to_string()).or_default() += 1;
        *summary.by_entry_kind.entry(signal.entry_kind.to_string()).or_default() += 1;
        match signal.direction {
            Direction::Buy => summary.buys += 1,
            Direction::Sell => summary.sells += 1,
        }
    }

    if summary.analyses > 0 {
        summary.signal_rate = Some(summary.signals as f64 / summary.analyses as f64 * 100.0);
    }
    if summary.signals > 0 {
        summary.avg_stop_distance = Some(stop_total / summary.signals as f64);
    }
    summary
}

impl std::fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Analyses: {}", self.analyses)?;
        if let (Some(first), Some(last)) = (self.first_analysis, self.last_analysis) {
            writeln!(f, "Period: {} → {}", first.format("%Y-%m-%d %H:%M:%S"), last.format("%Y-%m-%d %H:%M:%S"))?;
        }
        match self.signal_rate {
            Some(rate) => writeln!(f, "Signals: {} ({rate:.1}%)", self.signals)?,
            None => writeln!(f, "Signals: {}", self.signals)?,
        }
        if self.signals > 0 {
            writeln!(f, "Buy: {}  Sell: {}", self.buys, self.sells)?;
        }
        if let Some(avg) = self.avg_stop_distance {
            writeln!(f, "Average stop distance: {avg:.5}")?;
        }
        for (title, counts) in [
            ("Bias", &self.by_bias),
            ("Decisions", &self.by_decision),
            ("Opportunities", &self.by_opportunity),
            ("Entry kinds", &self.by_entry_kind),
        ] {
            if counts.is_empty() {
                continue;
            }
            writeln!(f, "{title}:")?;
            for (key, n) in counts {
                writeln!(f, "  {key}: {n}")?;
            }
        }
        Ok(())
    }
}
