use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use common::{parse_timestamp, Candle, CandleProvider, Error, Result};

/// Candle source backed by CSV exports, one file per symbol and timeframe:
/// `{dir}/{symbol}_{timeframe}.csv` with a `time,open,high,low,close[,volume]`
/// header.
pub struct CsvCandleProvider {
    dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

impl CsvCandleProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str, timeframe: &str) -> PathBuf {
        self.dir.join(format!("{symbol}_{timeframe}.csv"))
    }

    /// Every candle in the file, oldest first.
    async fn load(&self, symbol: &str, timeframe: &str) -> Result<Vec<Candle>> {
        let path = self.path_for(symbol, timeframe);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::DataUnavailable {
                    symbol: symbol.to_string(),
                    timeframe: timeframe.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let mut candles = parse_csv(&bytes, &path)?;
        candles.sort_by_key(|c| c.timestamp);
        debug!(path = %path.display(), count = candles.len(), "Loaded candles");
        Ok(candles)
    }
}

fn parse_csv(bytes: &[u8], path: &Path) -> Result<Vec<Candle>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(bytes);
    let mut candles = Vec::new();
    for (line, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!(path = %path.display(), row = line + 1, error = %e, "Skipping malformed row");
                continue;
            }
        };
        let timestamp = match parse_timestamp(&row.time) {
            Ok(ts) => ts,
            Err(e) => {
                warn!(path = %path.display(), row = line + 1, error = %e, "Skipping row with bad timestamp");
                continue;
            }
        };
        candles.push(Candle {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    Ok(candles)
}

#[async_trait]
impl CandleProvider for CsvCandleProvider {
    async fn candles(&self, symbol: &str, timeframe: &str, count: usize) -> Result<Vec<Candle>> {
        let mut candles = self.load(symbol, timeframe).await?;
        let skip = candles.len().saturating_sub(count);
        Ok(candles.split_off(skip))
    }

    async fn candles_in_range(
        &self,
        symbol: &str,
        timeframe: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let candles = self.load(symbol, timeframe).await?;
        Ok(candles
            .into_iter()
            .filter(|c| c.timestamp >= from && c.timestamp <= to)
            .collect())
    }
}
