use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Insufficient data: need {needed} candles, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Invalid signal: {0}")]
    InvalidSignal(String),

    #[error("No data available for {symbol} {timeframe}")]
    DataUnavailable { symbol: String, timeframe: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timestamp error: {0}")]
    Timestamp(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
