//! Audit snapshot of one strategy analysis.
//!
//! Records are produced by the strategy engine as plain values and written
//! by a `RecordSink`. Nothing in the engine reads them back; only the
//! offline consolidated report does.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Bias, EntryKind, Gap, Signal};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Monotonic per engine instance; together with `analyzed_at` it keys the record.
    pub sequence: u64,
    pub analyzed_at: DateTime<Utc>,
    pub inputs: InputSummary,
    pub bias: Option<BiasReport>,
    pub gaps: Option<GapReport>,
    pub entry: Option<EntryReport>,
    pub decision: Decision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSummary {
    pub session_filter: bool,
    pub htf_received: usize,
    pub ltf_received: usize,
    pub htf_in_session: usize,
    pub ltf_in_session: usize,
}

/// Which bias rule fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasRule {
    /// Window shorter than required.
    InsufficientData,
    /// Close beyond the swing extreme.
    HardBreak,
    /// Close within the soft threshold of a swing extreme.
    SoftBreak,
    /// Net close-to-close displacement over the window.
    Trend,
    /// No new information; the last valid bias was reused.
    Fallback,
    Undetermined,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiasReport {
    pub bias: Bias,
    pub rule: BiasRule,
    /// swing high for bullish, swing low for bearish.
    pub reference: Option<f64>,
    pub window: usize,
    pub swing_high: Option<f64>,
    pub swing_low: Option<f64>,
    pub price: Option<f64>,
    pub trend: Option<f64>,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapReport {
    pub atr: f64,
    pub new_gaps: Vec<Gap>,
    pub new_inversions: Vec<Gap>,
    pub gap_memory: usize,
    pub inversion_memory: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryReport {
    /// Opportunities tested, in evaluation order, up to and including the match.
    pub evaluated: Vec<Gap>,
    pub matched: Option<Gap>,
    pub entry_kind: Option<EntryKind>,
}

/// Final outcome of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// A series was empty after the session filter.
    NoData,
    InsufficientData { needed: usize, got: usize },
    NoBias,
    NoEntry,
    InvalidSignal { reason: String },
    Signal(Signal),
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::NoData => "no_data",
            Decision::InsufficientData { .. } => "insufficient_data",
            Decision::NoBias => "no_bias",
            Decision::NoEntry => "no_entry",
            Decision::InvalidSignal { .. } => "invalid_signal",
            Decision::Signal(_) => "signal",
        }
    }

    pub fn signal(&self) -> Option<&Signal> {
        match self {
            Decision::Signal(s) => Some(s),
            _ => None,
        }
    }
}
