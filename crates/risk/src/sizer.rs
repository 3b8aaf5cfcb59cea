use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use common::{Direction, EntrySetup, Error, Result, Signal};

/// Smallest tradable lot. Sizing never goes below it.
pub const MIN_POSITION_SIZE: f64 = 0.01;

/// User-configurable risk parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Account balance the risk budget is taken from.
    pub account_balance: f64,
    /// Fraction of the balance risked per trade (e.g. 0.01 = 1%).
    pub risk_per_trade: f64,
    /// Take-profit distance as a multiple of the stop distance.
    pub reward_risk: f64,
    /// Account currency per pip per lot.
    pub pip_value: f64,
    /// Price increment of one pip (0.0001 for most FX pairs).
    pub pip_size: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            account_balance: 10_000.0,
            risk_per_trade: 0.01,
            reward_risk: 2.0,
            pip_value: 10.0,
            pip_size: 0.0001,
        }
    }
}

/// Turns an entry setup into a complete signal with stop, target and size.
#[derive(Debug, Clone, Default)]
pub struct RiskSizer {
    config: RiskConfig,
}

impl RiskSizer {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Money at risk on one trade.
    pub fn risk_budget(&self) -> f64 {
        self.config.account_balance * self.config.risk_per_trade
    }

    /// Complete `setup` into a signal.
    ///
    /// Fails with `InvalidSignal` when entry and stop coincide; any positive
    /// stop distance succeeds.
    pub fn size(&self, setup: &EntrySetup) -> Result<Signal> {
        let stop_distance = (setup.entry_price - setup.stop_loss).abs();
        if stop_distance == 0.0 || !stop_distance.is_finite() {
            warn!(entry = setup.entry_price, stop = setup.stop_loss, "Stop distance is zero, signal discarded");
            return Err(Error::InvalidSignal(format!(
                "stop distance is zero (entry {:.5} = stop {:.5})",
                setup.entry_price, setup.stop_loss
            )));
        }

        let rr = self.config.reward_risk;
        let take_profit = match setup.direction {
            Direction::Buy => setup.entry_price + rr * stop_distance,
            Direction::Sell => setup.entry_price - rr * stop_distance,
        };

        let stop_pips = stop_distance / self.config.pip_size;
        let position_size = self.position_size(stop_pips);

        info!(
            direction = %setup.direction,
            entry = setup.entry_price,
            stop = setup.stop_loss,
            take_profit = take_profit,
            stop_pips = stop_pips,
            size = position_size,
            "Signal sized"
        );

        Ok(Signal {
            direction: setup.direction,
            entry_price: setup.entry_price,
            stop_loss: setup.stop_loss,
            take_profit,
            stop_distance,
            rr_ratio: rr,
            position_size,
            timestamp: setup.timestamp,
            opportunity: setup.opportunity,
            entry_kind: setup.entry_kind,
        })
    }

    /// Lots such that a stop-out loses the risk budget, rounded to 0.01 and
    /// floored at `MIN_POSITION_SIZE`.
    fn position_size(&self, stop_pips: f64) -> f64 {
        let raw = self.risk_budget() / (stop_pips * self.config.pip_value);
        let rounded = (raw * 100.0).round() / 100.0;
        if rounded.is_finite() {
            rounded.max(MIN_POSITION_SIZE)
        } else {
            MIN_POSITION_SIZE
        }
    }
}
