use tracing::{info, warn};

use common::{Bias, BiasReport, BiasRule, Candle};

/// Reads market direction from the trailing higher-timeframe window.
///
/// Rules, first match wins:
/// 1. window shorter than required → undetermined
/// 2. close above swing high / below swing low → hard break
/// 3. close within `soft_threshold` of the swing high / low → soft break
/// 4. sign of last close − first close → trend
/// 5. zero displacement → last valid bias, if any
///
/// Every bullish or bearish result from rules 2–4 becomes the new last
/// valid bias. It is never reset to undetermined.
#[derive(Debug, Clone)]
pub struct BiasDetector {
    window: usize,
    soft_threshold: f64,
    last_valid: Option<Bias>,
}

impl BiasDetector {
    pub fn new(window: usize, soft_threshold: f64) -> Self {
        Self { window, soft_threshold, last_valid: None }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn last_valid(&self) -> Option<Bias> {
        self.last_valid
    }

    pub fn detect(&mut self, candles: &[Candle]) -> BiasReport {
        let mut report = BiasReport {
            bias: Bias::Undetermined,
            rule: BiasRule::InsufficientData,
            reference: None,
            window: self.window,
            swing_high: None,
            swing_low: None,
            price: None,
            trend: None,
            threshold: self.soft_threshold,
        };

        if candles.len() < self.window || self.window == 0 {
            warn!(have = candles.len(), need = self.window, "Not enough higher-timeframe candles for bias");
            return report;
        }

        let window = &candles[candles.len() - self.window..];
        let swing_high = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        let swing_low = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let price = window[window.len() - 1].close;
        let trend = price - window[0].close;

        report.swing_high = Some(swing_high);
        report.swing_low = Some(swing_low);
        report.price = Some(price);
        info!(swing_high, swing_low, price, "Higher-timeframe structure");

        let (bias, rule) = if price > swing_high {
            (Bias::Bullish, BiasRule::HardBreak)
        } else if price < swing_low {
            (Bias::Bearish, BiasRule::HardBreak)
        } else if price > swing_high - self.soft_threshold {
            (Bias::Bullish, BiasRule::SoftBreak)
        } else if price < swing_low + self.soft_threshold {
            (Bias::Bearish, BiasRule::SoftBreak)
        } else {
            report.trend = Some(trend);
            if trend > 0.0 {
                (Bias::Bullish, BiasRule::Trend)
            } else if trend < 0.0 {
                (Bias::Bearish, BiasRule::Trend)
            } else {
                return self.fallback(report);
            }
        };

        self.last_valid = Some(bias);
        report.bias = bias;
        report.rule = rule;
        report.reference = match bias {
            Bias::Bullish => Some(swing_high),
            _ => Some(swing_low),
        };
        info!(bias = %bias, rule = ?rule, reference = ?report.reference, "Bias determined");
        report
    }

    fn fallback(&self, mut report: BiasReport) -> BiasReport {
        match self.last_valid {
            Some(bias) => {
                info!(bias = %bias, "Bias ambiguous, reusing last valid bias");
                report.bias = bias;
                report.rule = BiasRule::Fallback;
            }
            None => {
                info!("Bias ambiguous and no previous bias");
                report.rule = BiasRule::Undetermined;
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    /// Bars at the given closes with high/low = close ± 0.0005.
    fn series(closes: &[f64]) -> Vec<Candle> {
        let t0 = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: t0 + Duration::minutes(15 * i as i64),
                open: close,
                high: close + 0.0005,
                low: close - 0.0005,
                close,
                volume: 10.0,
            })
            .collect()
    }

    #[test]
    fn short_window_is_undetermined_and_keeps_last_valid() {
        let mut detector = BiasDetector::new(20, 0.0002);
        let report = detector.detect(&series(&[1.2; 5]));
        assert_eq!(report.bias, Bias::Undetermined);
        assert_eq!(report.rule, BiasRule::InsufficientData);
        assert_eq!(detector.last_valid(), None);
    }

    #[test]
    fn close_above_swing_high_is_bullish_hard_break() {
        // 19 bars topping at 1.2040, last close at 1.2050
        let mut candles = series(&[1.2030; 19]);
        candles.iter_mut().for_each(|c| c.high = 1.2040);
        candles.push(Candle { close: 1.2050, high: 1.2040, ..candles[18] });

        let mut detector = BiasDetector::new(20, 0.0002);
        let report = detector.detect(&candles);
        assert_eq!(report.bias, Bias::Bullish);
        assert_eq!(report.rule, BiasRule::HardBreak);
        assert_eq!(report.reference, Some(1.2040));
        assert_eq!(detector.last_valid(), Some(Bias::Bullish));
    }

    #[test]
    fn close_below_swing_low_is_bearish_hard_break() {
        let mut candles = series(&[1.1000; 20]);
        candles[19].low = 1.0990;
        candles[19].close = 1.0980;
        let mut detector = BiasDetector::new(20, 0.0002);
        let report = detector.detect(&candles);
        assert_eq!(report.bias, Bias::Bearish);
        assert_eq!(report.rule, BiasRule::HardBreak);
        assert_eq!(report.reference, Some(1.0990));
    }

    #[test]
    fn close_near_swing_high_is_soft_bullish() {
        let mut candles = series(&[1.1000; 20]);
        // swing high 1.1005, close 1.1004 is inside the 0.0002 threshold
        candles[19].close = 1.1004;
        let mut detector = BiasDetector::new(20, 0.0002);
        let report = detector.detect(&candles);
        assert_eq!(report.bias, Bias::Bullish);
        assert_eq!(report.rule, BiasRule::SoftBreak);
    }

    #[test]
    fn mid_range_uses_trend_and_reports_window_levels() {
        let closes: Vec<f64> = (0..20).map(|i| if i == 5 { 1.2100 } else { 1.2000 - i as f64 * 0.00001 }).collect();
        let mut candles = series(&closes);
        candles[6].low = 1.1900;
        let mut detector = BiasDetector::new(20, 0.0002);
        let report = detector.detect(&candles);
        assert_eq!(report.rule, BiasRule::Trend);
        assert_eq!(report.bias, Bias::Bearish);
        assert_eq!(report.reference, Some(1.1900));
        assert!(report.trend.unwrap() < 0.0);
    }

    #[test]
    fn zero_trend_falls_back_to_last_valid() {
        let mut detector = BiasDetector::new(20, 0.0002);

        // No history yet: undetermined.
        let mut flat = series(&[1.2000; 20]);
        flat[3].high = 1.2100;
        flat[4].low = 1.1900;
        let report = detector.detect(&flat);
        assert_eq!(report.bias, Bias::Undetermined);
        assert_eq!(report.rule, BiasRule::Undetermined);

        // Establish a bearish bias, then the flat window reuses it.
        let mut down = series(&[1.1000; 20]);
        down[19].low = 1.0990;
        down[19].close = 1.0980;
        detector.detect(&down);

        let report = detector.detect(&flat);
        assert_eq!(report.bias, Bias::Bearish);
        assert_eq!(report.rule, BiasRule::Fallback);
        assert_eq!(report.reference, None);
        assert_eq!(detector.last_valid(), Some(Bias::Bearish));
    }

    #[test]
    fn only_trailing_window_is_considered() {
        // An old spike outside the trailing window must not count as swing high.
        let mut candles = series(&[1.2000; 25]);
        candles[0].high = 1.3000;
        candles[24].close = 1.2010;
        let mut detector = BiasDetector::new(20, 0.0002);
        let report = detector.detect(&candles);
        assert_eq!(report.swing_high, Some(candles[5].high));
        assert_eq!(report.rule, BiasRule::HardBreak);
    }
}
