use serde::{Deserialize, Serialize};

use common::{Error, Result};
use risk::RiskConfig;

/// Top-level strategy config file (TOML).
///
/// Every key is optional; missing keys take the defaults below.
///
/// Example `config/strategy.toml`:
/// ```toml
/// [strategy]
/// bias_window = 20
/// soft_threshold = 0.0002
/// min_candle_range = 0.0003
/// atr_period = 14
/// min_gap_atr_ratio = 0.1
/// mitigation_tolerance = 0.00015
///
/// [session]
/// enabled = true
/// preset = "new_york"
///
/// [risk]
/// account_balance = 10000.0
/// risk_per_trade = 0.01
/// reward_risk = 2.0
/// pip_value = 10.0
/// pip_size = 0.0001
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StrategyFileConfig {
    pub strategy: StrategyParams,
    pub session: SessionConfig,
    pub risk: RiskConfig,
}

impl StrategyFileConfig {
    /// Load and validate a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read strategy config at '{path}': {e}")))?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("invalid strategy config at '{path}': {e}")))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.strategy;
        let r = &self.risk;
        let checks = [
            (s.bias_window >= 2, "strategy.bias_window must be at least 2"),
            (s.atr_period >= 1, "strategy.atr_period must be at least 1"),
            (s.min_ltf_candles >= 5, "strategy.min_ltf_candles must be at least 5"),
            (s.soft_threshold >= 0.0, "strategy.soft_threshold must not be negative"),
            (s.min_candle_range >= 0.0, "strategy.min_candle_range must not be negative"),
            (s.min_gap_atr_ratio >= 0.0, "strategy.min_gap_atr_ratio must not be negative"),
            (s.mitigation_tolerance >= 0.0, "strategy.mitigation_tolerance must not be negative"),
            (s.fresh_gaps >= 1, "strategy.fresh_gaps must be at least 1"),
            (r.pip_size > 0.0, "risk.pip_size must be positive"),
            (r.pip_value > 0.0, "risk.pip_value must be positive"),
            (r.account_balance > 0.0, "risk.account_balance must be positive"),
            (r.risk_per_trade > 0.0, "risk.risk_per_trade must be positive"),
            (r.reward_risk > 0.0, "risk.reward_risk must be positive"),
        ];
        match checks.iter().find(|(ok, _)| !ok) {
            Some((_, msg)) => Err(Error::Config((*msg).to_string())),
            None => Ok(()),
        }
    }
}

/// Detection parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StrategyParams {
    /// Higher-timeframe candles the bias is read from.
    pub bias_window: usize,
    /// Distance from a swing extreme that still counts as a (soft) break.
    pub soft_threshold: f64,
    /// Candles with a smaller high-low range are noise and break a gap pattern.
    pub min_candle_range: f64,
    pub atr_period: usize,
    /// A gap must be at least this fraction of ATR wide.
    pub min_gap_atr_ratio: f64,
    /// Distance from the gap edge that still triggers a proximity entry.
    pub mitigation_tolerance: f64,
    /// Lower-timeframe candles required before scanning for gaps.
    pub min_ltf_candles: usize,
    /// Newly found gaps kept per analysis.
    pub fresh_gaps: usize,
    /// Previously remembered gaps kept per analysis.
    pub retained_gaps: usize,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            bias_window: 20,
            soft_threshold: 0.0002,
            min_candle_range: 0.0003,
            atr_period: 14,
            min_gap_atr_ratio: 0.1,
            mitigation_tolerance: 0.00015,
            min_ltf_candles: 5,
            fresh_gaps: 3,
            retained_gaps: 5,
        }
    }
}

/// Named trading sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionPreset {
    NewYork,
    London,
    Asia,
    /// Use `start`, `end` and `timezone`.
    #[default]
    Custom,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub enabled: bool,
    pub preset: SessionPreset,
    /// `HH:MM` or `HH:MM:SS`, local to `timezone`.
    pub start: String,
    pub end: String,
    /// IANA name, e.g. "America/New_York".
    pub timezone: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            preset: SessionPreset::Custom,
            start: "00:00".to_string(),
            end: "23:59".to_string(),
            timezone: "America/New_York".to_string(),
        }
    }
}
