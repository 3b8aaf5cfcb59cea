use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{AnalysisRecord, Candle, Result};

/// Source of OHLC candles for one or more timeframes.
///
/// Implementations must return candles oldest first with non-decreasing
/// timestamps. An empty vector means "no data" and is not an error; the
/// runner skips the cycle in that case.
#[async_trait]
pub trait CandleProvider: Send + Sync {
    /// The most recent `count` candles for `symbol` on `timeframe`.
    async fn candles(&self, symbol: &str, timeframe: &str, count: usize) -> Result<Vec<Candle>>;

    /// All candles whose timestamp falls in `[from, to]`.
    async fn candles_in_range(
        &self,
        symbol: &str,
        timeframe: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>>;
}

/// Append-only destination for analysis audit records.
///
/// The strategy engine never calls a sink itself. The runner hands every
/// record produced by `StrategyEngine::analyze_detailed` to the sink and logs
/// failures; they never feed back into engine state.
pub trait RecordSink: Send + Sync {
    fn write_record(&self, record: &AnalysisRecord) -> Result<()>;
}
