use common::Candle;

/// Per-candle true range: max(high − low, |high − prev close|, |low − prev close|).
/// The first candle has no previous close and uses its high − low.
pub fn true_range(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .enumerate()
        .map(|(i, c)| match i.checked_sub(1).map(|p| candles[p].close) {
            Some(prev_close) => (c.high - c.low)
                .max((c.high - prev_close).abs())
                .max((c.low - prev_close).abs()),
            None => c.high - c.low,
        })
        .collect()
}

/// Average True Range as a simple rolling mean of true range.
///
/// Until `period` candles are available the raw true range stands in, so
/// the series has one value per candle and no leading gaps.
#[derive(Debug, Clone)]
pub struct AtrIndicator {
    pub period: usize,
}

impl AtrIndicator {
    /// A period of zero is treated as one.
    pub fn new(period: usize) -> Self {
        Self { period: period.max(1) }
    }

    /// One ATR value per input candle (oldest first).
    pub fn series(&self, candles: &[Candle]) -> Vec<f64> {
        let tr = true_range(candles);
        let mut out = Vec::with_capacity(tr.len());
        let mut rolling = 0.0;
        for (i, &value) in tr.iter().enumerate() {
            rolling += value;
            if i >= self.period {
                rolling -= tr[i - self.period];
            }
            if i + 1 >= self.period {
                out.push(rolling / self.period as f64);
            } else {
                out.push(value);
            }
        }
        out
    }

    /// ATR at the most recent candle. `None` for an empty series.
    pub fn latest(&self, candles: &[Candle]) -> Option<f64> {
        self.series(candles).last().copied()
    }
}
