use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Error, Result};

/// One OHLC bar. Series are always ordered oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// (high + low) / 2
    pub fn median_price(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// (open + high + low + close) / 4
    pub fn average_price(&self) -> f64 {
        (self.open + self.high + self.low + self.close) / 4.0
    }

    /// True when the OHLC values are mutually consistent.
    pub fn is_consistent(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }
}

/// Check a freshly fetched series before it reaches the strategy.
///
/// An empty series is `DataUnavailable`. Inconsistent bars are only
/// reported; the returned count lets callers surface them.
pub fn validate_candles(symbol: &str, timeframe: &str, candles: &[Candle]) -> Result<usize> {
    if candles.is_empty() {
        return Err(Error::DataUnavailable {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
        });
    }
    let inconsistent = candles.iter().filter(|c| !c.is_consistent()).count();
    if inconsistent > 0 {
        warn!(symbol, timeframe, inconsistent, "Series contains candles with inconsistent OHLC");
    }
    Ok(inconsistent)
}

/// Parse a candle timestamp.
///
/// Accepts RFC 3339 with an explicit offset (converted to UTC), a naive
/// `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DDTHH:MM:SS` (assumed UTC), or integer
/// Unix seconds.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y.%m.%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(secs) = raw.parse::<i64>() {
        return Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| Error::Timestamp(format!("out of range: {secs}")));
    }
    Err(Error::Timestamp(format!("unrecognised timestamp '{raw}'")))
}

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

/// Market direction read from the higher timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Bias {
    Bullish,
    Bearish,
    #[default]
    Undetermined,
}

impl Bias {
    /// Direction of gaps this bias looks for. `None` when undetermined.
    pub fn direction(self) -> Option<Direction> {
        match self {
            Bias::Bullish => Some(Direction::Buy),
            Bias::Bearish => Some(Direction::Sell),
            Bias::Undetermined => None,
        }
    }
}

impl std::fmt::Display for Bias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bias::Bullish => write!(f, "bullish"),
            Bias::Bearish => write!(f, "bearish"),
            Bias::Undetermined => write!(f, "undetermined"),
        }
    }
}

/// Whether an opportunity is a plain fair value gap or one whose direction
/// was flipped after a close through its far boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    Gap,
    InversionGap,
}

impl std::fmt::Display for GapKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GapKind::Gap => write!(f, "FVG"),
            GapKind::InversionGap => write!(f, "IFVG"),
        }
    }
}

/// A three-candle price imbalance. `upper > lower` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub direction: Direction,
    pub upper: f64,
    pub lower: f64,
    /// High of the middle candle.
    pub middle_high: f64,
    /// Low of the middle candle.
    pub middle_low: f64,
    /// Index of the third candle inside the window it was found in.
    pub source_index: usize,
    /// Timestamp of the third candle; the gap exists from this bar on.
    pub formed_at: DateTime<Utc>,
    pub kind: GapKind,
}

impl Gap {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Consequent encroachment: the midpoint of the gap.
    pub fn midpoint(&self) -> f64 {
        (self.upper + self.lower) / 2.0
    }

    /// Middle-candle extreme on the losing side of a trade in `direction`:
    /// its low for a buy, its high for a sell.
    pub fn stop_anchor(&self) -> f64 {
        match self.direction {
            Direction::Buy => self.middle_low,
            Direction::Sell => self.middle_high,
        }
    }

    /// Same imbalance, ignoring where it was found.
    pub fn same_zone(&self, other: &Gap) -> bool {
        self.direction == other.direction
            && self.formed_at == other.formed_at
            && self.upper == other.upper
            && self.lower == other.lower
    }

    /// The gap traded the other way, as after a close through it. The stop
    /// anchor follows the new direction.
    pub fn inverted(&self) -> Gap {
        Gap {
            direction: self.direction.opposite(),
            kind: GapKind::InversionGap,
            ..*self
        }
    }
}

/// Which condition on the latest candle triggered an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    FullMitigation,
    ConsequentEncroachment,
    Proximity,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::FullMitigation => write!(f, "full mitigation"),
            EntryKind::ConsequentEncroachment => write!(f, "CE entry"),
            EntryKind::Proximity => write!(f, "proximity"),
        }
    }
}

/// Statistics bucket for an operation: consequent-encroachment entries form
/// their own bucket, everything else is grouped by opportunity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupClass {
    Gap,
    InversionGap,
    ConsequentEncroachment,
}

impl SetupClass {
    pub fn of(opportunity: GapKind, entry: EntryKind) -> Self {
        match (entry, opportunity) {
            (EntryKind::ConsequentEncroachment, _) => SetupClass::ConsequentEncroachment,
            (_, GapKind::InversionGap) => SetupClass::InversionGap,
            (_, GapKind::Gap) => SetupClass::Gap,
        }
    }
}

/// An entry found by the evaluator, before risk sizing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntrySetup {
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub timestamp: DateTime<Utc>,
    pub opportunity: GapKind,
    pub entry_kind: EntryKind,
}

/// A complete trade proposal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub stop_distance: f64,
    pub rr_ratio: f64,
    pub position_size: f64,
    pub timestamp: DateTime<Utc>,
    pub opportunity: GapKind,
    pub entry_kind: EntryKind,
}

impl Signal {
    pub fn setup_class(&self) -> SetupClass {
        SetupClass::of(self.opportunity, self.entry_kind)
    }
}

/// Result of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
    Pending,
}

/// A trade outcome registered in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub outcome: Outcome,
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub pips: f64,
    pub stop_distance: f64,
    pub rr_ratio: f64,
    pub opportunity: GapKind,
    pub entry_kind: EntryKind,
}

impl Operation {
    /// An operation that has been opened but not resolved.
    pub fn pending(signal: &Signal) -> Self {
        Self {
            outcome: Outcome::Pending,
            direction: signal.direction,
            entry_price: signal.entry_price,
            exit_price: None,
            pips: 0.0,
            stop_distance: signal.stop_distance,
            rr_ratio: signal.rr_ratio,
            opportunity: signal.opportunity,
            entry_kind: signal.entry_kind,
        }
    }

    pub fn setup_class(&self) -> SetupClass {
        SetupClass::of(self.opportunity, self.entry_kind)
    }
}

/// Current state of the polling runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Stopped => write!(f, "stopped"),
            EngineState::Running => write!(f, "running"),
            EngineState::Paused => write!(f, "paused"),
        }
    }
}

/// Commands sent to the runner via its handle.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    Start,
    Stop,
    Pause,
    Resume,
}
