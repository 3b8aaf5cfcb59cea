use std::collections::VecDeque;

use tracing::{debug, info};

use common::{Candle, Direction, Error, Gap, GapKind, Result};

use crate::indicators::AtrIndicator;

/// Bounded most-recent-first collection.
///
/// Each merge keeps at most `fresh_limit` new items, placed first, followed
/// by at most `retained_limit` of the previous items. Capacity is therefore
/// `fresh_limit + retained_limit`.
#[derive(Debug, Clone)]
pub struct RecentBuffer<T> {
    items: VecDeque<T>,
    fresh_limit: usize,
    retained_limit: usize,
}

impl<T: Clone> RecentBuffer<T> {
    pub fn new(fresh_limit: usize, retained_limit: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(fresh_limit + retained_limit),
            fresh_limit,
            retained_limit,
        }
    }

    pub fn capacity(&self) -> usize {
        self.fresh_limit + self.retained_limit
    }

    /// Prepend `fresh` (newest first). Previous items that `same` matches
    /// against a kept fresh item are dropped rather than kept twice.
    pub fn merge(&mut self, fresh: Vec<T>, same: impl Fn(&T, &T) -> bool) {
        let fresh: Vec<T> = fresh.into_iter().take(self.fresh_limit).collect();
        let retained: Vec<T> = self
            .items
            .drain(..)
            .filter(|old| !fresh.iter().any(|new| same(old, new)))
            .take(self.retained_limit)
            .collect();
        self.items.extend(fresh);
        self.items.extend(retained);
    }

    /// Remove and return every item matching `pred`, in order.
    pub fn extract(&mut self, mut pred: impl FnMut(&T) -> bool) -> Vec<T> {
        let mut taken = Vec::new();
        let mut kept = VecDeque::with_capacity(self.items.len());
        for item in self.items.drain(..) {
            if pred(&item) {
                taken.push(item);
            } else {
                kept.push_back(item);
            }
        }
        self.items = kept;
        taken
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Finds fair value gaps in a lower-timeframe window.
#[derive(Debug, Clone)]
pub struct GapDetector {
    min_candle_range: f64,
    min_gap_atr_ratio: f64,
    min_candles: usize,
    atr: AtrIndicator,
}

/// Gaps found by one scan, newest first, and the ATR at the latest candle.
#[derive(Debug, Clone, PartialEq)]
pub struct GapScan {
    pub gaps: Vec<Gap>,
    pub atr: f64,
}

impl GapDetector {
    pub fn new(min_candle_range: f64, atr_period: usize, min_gap_atr_ratio: f64, min_candles: usize) -> Self {
        Self {
            min_candle_range,
            min_gap_atr_ratio,
            min_candles,
            atr: AtrIndicator::new(atr_period),
        }
    }

    fn is_valid(&self, candle: &Candle) -> bool {
        candle.range() >= self.min_candle_range
    }

    /// Scan triples `(i-2, i-1, i)` from `len-5` down to `i = 3` for gaps in
    /// `direction`. The newest few candles are left out so a gap has bars
    /// after it to be traded from.
    pub fn scan(&self, candles: &[Candle], direction: Direction) -> Result<GapScan> {
        let n = candles.len();
        if n < self.min_candles {
            return Err(Error::InsufficientData { needed: self.min_candles, got: n });
        }

        let atr = self.atr.series(candles);
        let mut gaps = Vec::new();

        for i in (3..n.saturating_sub(4)).rev() {
            let (prev, mid, cur) = (&candles[i - 2], &candles[i - 1], &candles[i]);
            if ![prev, mid, cur].iter().all(|c| self.is_valid(c)) {
                continue;
            }

            let candidate = match direction {
                Direction::Buy if cur.low > prev.high => Some((cur.low, prev.high)),
                Direction::Sell if cur.high < prev.low => Some((prev.low, cur.high)),
                _ => None,
            };
            let Some((upper, lower)) = candidate else {
                continue;
            };

            let min_width = atr[i] * self.min_gap_atr_ratio;
            if upper - lower < min_width {
                debug!(index = i, width = upper - lower, min_width, "Gap smaller than ATR filter");
                continue;
            }

            info!(index = i, direction = %direction, upper, lower, "Fair value gap detected");
            gaps.push(Gap {
                direction,
                upper,
                lower,
                middle_high: mid.high,
                middle_low: mid.low,
                source_index: i,
                formed_at: cur.timestamp,
                kind: GapKind::Gap,
            });
        }

        Ok(GapScan { gaps, atr: atr.last().copied().unwrap_or_default() })
    }
}

/// Gaps remembered across analyses: plain gaps and inversion gaps.
#[derive(Debug, Clone)]
pub struct GapMemory {
    plain: RecentBuffer<Gap>,
    inverted: RecentBuffer<Gap>,
}

impl GapMemory {
    pub fn new(fresh_limit: usize, retained_limit: usize) -> Self {
        Self {
            plain: RecentBuffer::new(fresh_limit, retained_limit),
            inverted: RecentBuffer::new(fresh_limit, retained_limit),
        }
    }

    /// Merge newly detected gaps, then move every remembered gap that a
    /// later close in `candles` has broken through into inversion memory.
    /// Returns the gaps inverted by this call.
    ///
    /// A fresh gap that is already remembered as inverted is ignored, so a
    /// broken gap still inside the scan window is reported only once.
    pub fn absorb(&mut self, fresh: Vec<Gap>, candles: &[Candle]) -> Vec<Gap> {
        let fresh: Vec<Gap> = fresh
            .into_iter()
            .filter(|gap| {
                let flipped = gap.inverted();
                !self.inverted.iter().any(|inv| inv.same_zone(&flipped))
            })
            .collect();
        self.plain.merge(fresh, Gap::same_zone);

        let broken = self.plain.extract(|gap| {
            candles
                .iter()
                .filter(|c| c.timestamp > gap.formed_at)
                .any(|c| match gap.direction {
                    Direction::Buy => c.close < gap.lower,
                    Direction::Sell => c.close > gap.upper,
                })
        });

        let inversions: Vec<Gap> = broken.iter().map(Gap::inverted).collect();
        for gap in &inversions {
            info!(direction = %gap.direction, upper = gap.upper, lower = gap.lower, "Gap inverted");
        }
        self.inverted.merge(inversions.clone(), Gap::same_zone);
        inversions
    }

    /// All opportunities in evaluation order: plain gaps, then inversion gaps.
    pub fn opportunities(&self) -> impl Iterator<Item = &Gap> {
        self.plain.iter().chain(self.inverted.iter())
    }

    pub fn plain(&self) -> &RecentBuffer<Gap> {
        &self.plain
    }

    pub fn inverted(&self) -> &RecentBuffer<Gap> {
        &self.inverted
    }
}
