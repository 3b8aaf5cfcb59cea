use tracing::debug;

use common::{Candle, Direction, Operation, Outcome, Signal};

/// Resolve `signal` against the candles that followed it.
///
/// Candles at or before the signal timestamp are ignored. Within a bar the
/// stop is checked before the target. A signal that touches neither is
/// returned as pending.
pub fn simulate(signal: &Signal, candles: &[Candle], pip_size: f64) -> Operation {
    let mut operation = Operation::pending(signal);

    for candle in candles.iter().filter(|c| c.timestamp > signal.timestamp) {
        let hit = match signal.direction {
            Direction::Buy if candle.low <= signal.stop_loss => Some((Outcome::Loss, signal.stop_loss)),
            Direction::Buy if candle.high >= signal.take_profit => Some((Outcome::Win, signal.take_profit)),
            Direction::Sell if candle.high >= signal.stop_loss => Some((Outcome::Loss, signal.stop_loss)),
            Direction::Sell if candle.low <= signal.take_profit => Some((Outcome::Win, signal.take_profit)),
            _ => None,
        };

        if let Some((outcome, exit)) = hit {
            let moved = match signal.direction {
                Direction::Buy => exit - signal.entry_price,
                Direction::Sell => signal.entry_price - exit,
            };
            operation.outcome = outcome;
            operation.exit_price = Some(exit);
            operation.pips = moved / pip_size;
            debug!(outcome = ?outcome, exit, pips = operation.pips, at = %candle.timestamp, "Simulated exit");
            break;
        }
    }

    operation
}
