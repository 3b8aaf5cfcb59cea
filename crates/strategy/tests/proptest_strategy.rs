use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{Bias, BiasRule, Candle, Direction, Gap, GapKind};
use proptest::prelude::*;
use strategy::{BiasDetector, EntryEvaluator, GapDetector, GapMemory, SessionFilter, StrategyEngine, StrategyFileConfig};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap()
}

/// A walk of consistent candles, one minute apart.
fn candles(max_len: usize) -> impl Strategy<Value = Vec<Candle>> {
    prop::collection::vec((-0.0020f64..0.0020, 0.0f64..0.0015, 0.0f64..0.0015), 0..max_len).prop_map(
        |steps| {
            let mut price = 1.2000;
            steps
                .into_iter()
                .enumerate()
                .map(|(i, (step, up, down))| {
                    let open = price;
                    let close = price + step;
                    let high = open.max(close) + up;
                    let low = open.min(close) - down;
                    price = close;
                    Candle {
                        timestamp: t0() + Duration::minutes(i as i64),
                        open,
                        high,
                        low,
                        close,
                        volume: 1.0,
                    }
                })
                .collect()
        },
    )
}

fn direction() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::Buy), Just(Direction::Sell)]
}

proptest! {
    #[test]
    fn disabled_session_filter_is_identity(series in candles(40)) {
        let out = SessionFilter::disabled().apply(&series);
        prop_assert_eq!(&*out, series.as_slice());
    }

    #[test]
    fn detected_gaps_have_upper_above_lower(series in candles(60), dir in direction()) {
        let detector = GapDetector::new(0.0003, 14, 0.1, 5);
        if let Ok(scan) = detector.scan(&series, dir) {
            for gap in &scan.gaps {
                prop_assert!(gap.upper > gap.lower);
                prop_assert_eq!(gap.direction, dir);
            }
            let mut memory = GapMemory::new(3, 5);
            memory.absorb(scan.gaps, &series);
            for gap in memory.opportunities() {
                prop_assert!(gap.upper > gap.lower);
            }
        }
    }

    #[test]
    fn engine_memory_stays_bounded(
        htf in candles(30),
        windows in prop::collection::vec(candles(60), 1..8),
    ) {
        let mut engine = StrategyEngine::new(&StrategyFileConfig::default()).unwrap();
        for ltf in &windows {
            engine.analyze(&htf, ltf);
            prop_assert!(engine.gap_memory().plain().len() <= 8);
            prop_assert!(engine.gap_memory().inverted().len() <= 8);
        }
    }

    #[test]
    fn entry_matches_a_stated_condition(
        series in candles(2),
        upper_off in 0.0001f64..0.0030,
        width in 0.0001f64..0.0020,
        dir in direction(),
    ) {
        prop_assume!(!series.is_empty());
        let recent = series[series.len() - 1];
        let upper = recent.close + upper_off - 0.0015;
        let gap = Gap {
            direction: dir,
            upper,
            lower: upper - width,
            middle_high: upper + 0.0005,
            middle_low: upper - width - 0.0005,
            source_index: 3,
            formed_at: t0(),
            kind: GapKind::Gap,
        };
        let tolerance = 0.00015;
        let decision = EntryEvaluator::new(tolerance).evaluate(&recent, [&gap]);
        if let Some(setup) = decision.setup {
            let ce = gap.midpoint();
            let holds = match dir {
                Direction::Buy => (recent.low <= gap.upper && recent.close > gap.lower)
                    || (recent.low <= ce && recent.close > ce)
                    || (recent.low - gap.upper).abs() <= tolerance,
                Direction::Sell => (recent.high >= gap.lower && recent.close < gap.upper)
                    || (recent.high >= ce && recent.close < ce)
                    || (recent.high - gap.lower).abs() <= tolerance,
            };
            prop_assert!(holds);
            prop_assert_eq!(setup.entry_price, recent.close);
            prop_assert_eq!(decision.evaluated.len(), 1);
        }
    }

    #[test]
    fn close_beyond_swing_extreme_sets_bias(
        series in candles(40),
        offset in 0.0001f64..0.0050,
        upward in any::<bool>(),
    ) {
        prop_assume!(series.len() >= 20);
        let mut series = series;
        let n = series.len();
        let window = &series[n - 20..];
        let swing_high = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        let swing_low = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        series[n - 1].close = if upward { swing_high + offset } else { swing_low - offset };

        let mut detector = BiasDetector::new(20, 0.0002);
        let report = detector.detect(&series);
        let expected = if upward { Bias::Bullish } else { Bias::Bearish };
        prop_assert_eq!(report.bias, expected);
        prop_assert_eq!(report.rule, BiasRule::HardBreak);
        prop_assert_eq!(detector.last_valid(), Some(expected));
    }
}
