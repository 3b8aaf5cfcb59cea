use chrono::Utc;
use tracing::{info, warn};

use common::{
    AnalysisRecord, Bias, BiasRule, Candle, Decision, EntryReport, Error, GapReport, InputSummary, Operation,
    Signal,
};
use paper::{Ledger, LedgerEntry, Statistics};
use risk::{RiskConfig, RiskSizer};

use crate::bias::BiasDetector;
use crate::config::{StrategyFileConfig, StrategyParams};
use crate::entry::EntryEvaluator;
use crate::gaps::{GapDetector, GapMemory};
use crate::session::SessionFilter;

/// The full analysis pipeline plus the state it carries between calls.
///
/// Session filter → bias → gap scan and memory → entry → risk sizing. The
/// last valid bias and both gap memories live here and survive every call,
/// including calls that end without a signal. Calls must be serialized by
/// the owner; the engine is not shared across tasks.
pub struct StrategyEngine {
    params: StrategyParams,
    session: SessionFilter,
    bias: BiasDetector,
    detector: GapDetector,
    memory: GapMemory,
    evaluator: EntryEvaluator,
    sizer: RiskSizer,
    ledger: Ledger,
    sequence: u64,
}

impl StrategyEngine {
    pub fn new(cfg: &StrategyFileConfig) -> common::Result<Self> {
        cfg.validate()?;
        let p = &cfg.strategy;
        Ok(Self {
            session: SessionFilter::from_config(&cfg.session)?,
            bias: BiasDetector::new(p.bias_window, p.soft_threshold),
            detector: GapDetector::new(p.min_candle_range, p.atr_period, p.min_gap_atr_ratio, p.min_ltf_candles),
            memory: GapMemory::new(p.fresh_gaps, p.retained_gaps),
            evaluator: EntryEvaluator::new(p.mitigation_tolerance),
            sizer: RiskSizer::new(cfg.risk.clone()),
            ledger: Ledger::new(),
            sequence: 0,
            params: p.clone(),
        })
    }

    /// Run one analysis and return the signal, if any.
    pub fn analyze(&mut self, htf: &[Candle], ltf: &[Candle]) -> Option<Signal> {
        self.analyze_detailed(htf, ltf).decision.signal().copied()
    }

    /// Run one analysis and return its full audit record.
    ///
    /// Never fails: every error inside the pipeline becomes the record's
    /// `Decision`.
    pub fn analyze_detailed(&mut self, htf: &[Candle], ltf: &[Candle]) -> AnalysisRecord {
        self.sequence += 1;
        let htf_session = self.session.apply(htf);
        let ltf_session = self.session.apply(ltf);

        let mut record = AnalysisRecord {
            sequence: self.sequence,
            analyzed_at: Utc::now(),
            inputs: InputSummary {
                session_filter: self.session.is_enabled(),
                htf_received: htf.len(),
                ltf_received: ltf.len(),
                htf_in_session: htf_session.len(),
                ltf_in_session: ltf_session.len(),
            },
            bias: None,
            gaps: None,
            entry: None,
            decision: Decision::NoData,
        };

        let (Some(recent), false) = (ltf_session.last(), htf_session.is_empty()) else {
            warn!(
                htf = htf_session.len(),
                ltf = ltf_session.len(),
                "No candles left after session filter; skipping analysis"
            );
            return record;
        };

        let bias = self.bias.detect(&htf_session);
        record.bias = Some(bias);
        let Some(direction) = bias.bias.direction() else {
            record.decision = match bias.rule {
                BiasRule::InsufficientData => Decision::InsufficientData {
                    needed: bias.window,
                    got: htf_session.len(),
                },
                _ => Decision::NoBias,
            };
            info!(decision = record.decision.label(), "No tradable bias");
            return record;
        };

        let scan = match self.detector.scan(&ltf_session, direction) {
            Ok(scan) => scan,
            Err(e) => {
                warn!(error = %e, "Gap scan skipped");
                record.decision = decision_from_error(e);
                return record;
            }
        };

        let new_inversions = self.memory.absorb(scan.gaps.clone(), &ltf_session);
        record.gaps = Some(GapReport {
            atr: scan.atr,
            new_gaps: scan.gaps,
            new_inversions,
            gap_memory: self.memory.plain().len(),
            inversion_memory: self.memory.inverted().len(),
        });

        let entry = self.evaluator.evaluate(recent, self.memory.opportunities());
        record.entry = Some(EntryReport {
            evaluated: entry.evaluated,
            matched: entry.matched,
            entry_kind: entry.setup.map(|s| s.entry_kind),
        });
        let Some(setup) = entry.setup else {
            record.decision = Decision::NoEntry;
            return record;
        };

        record.decision = match self.sizer.size(&setup) {
            Ok(signal) => {
                info!(
                    direction = %signal.direction,
                    entry = signal.entry_price,
                    sl = signal.stop_loss,
                    tp = signal.take_profit,
                    size = signal.position_size,
                    "Signal generated"
                );
                Decision::Signal(signal)
            }
            Err(e) => decision_from_error(e),
        };
        record
    }

    /// Append an operation to the ledger.
    pub fn register_operation(&mut self, operation: Operation) -> &LedgerEntry {
        self.ledger.record(operation)
    }

    pub fn statistics(&self) -> Statistics {
        self.ledger.statistics()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn last_valid_bias(&self) -> Option<Bias> {
        self.bias.last_valid()
    }

    pub fn gap_memory(&self) -> &GapMemory {
        &self.memory
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    pub fn risk_config(&self) -> &RiskConfig {
        self.sizer.config()
    }

    /// Number of analyses run so far.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

fn decision_from_error(err: Error) -> Decision {
    match err {
        Error::InsufficientData { needed, got } => Decision::InsufficientData { needed, got },
        Error::InvalidSignal(reason) => Decision::InvalidSignal { reason },
        Error::DataUnavailable { .. } => Decision::NoData,
        other => Decision::InvalidSignal { reason: other.to_string() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone};
    use common::{Direction, EntryKind, GapKind, Outcome};

    fn t(i: usize) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 14, 0, 0).unwrap() + Duration::minutes(i as i64)
    }

    fn bar(i: usize, high: f64, low: f64, close: f64) -> Candle {
        Candle { timestamp: t(i), open: (high + low) / 2.0, high, low, close, volume: 5.0 }
    }

    /// Twenty rising 15-minute bars: bullish by trend.
    fn rising_htf() -> Vec<Candle> {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        (0..20)
            .map(|i| {
                let close = 1.2000 + i as f64 * 0.0001;
                Candle {
                    timestamp: t0 + Duration::minutes(15 * i),
                    open: close - 0.0001,
                    high: close + 0.0005,
                    low: close - 0.0005,
                    close,
                    volume: 100.0,
                }
            })
            .collect()
    }

    /// Ten one-minute bars with a bullish gap (prev high 1.2000, current low
    /// 1.2005) completed at index 4, and a last bar trading back into it.
    fn ltf_with_gap(middle_low: f64) -> Vec<Candle> {
        let mut c: Vec<Candle> = (0..10).map(|i| bar(i, 1.2000, 1.1990, 1.1995)).collect();
        c[3] = bar(3, 1.2014, middle_low, 1.2012);
        c[4] = bar(4, 1.2015, 1.2005, 1.2012);
        for (i, candle) in c.iter_mut().enumerate().take(9).skip(5) {
            *candle = bar(i, 1.2020, 1.2008, 1.2015);
        }
        c[9] = bar(9, 1.2012, 1.2003, 1.2010);
        c
    }

    fn engine() -> StrategyEngine {
        StrategyEngine::new(&StrategyFileConfig::default()).unwrap()
    }

    #[test]
    fn full_pipeline_emits_sized_signal() {
        let mut engine = engine();
        let record = engine.analyze_detailed(&rising_htf(), &ltf_with_gap(1.2000));

        let gaps = record.gaps.as_ref().unwrap();
        assert_eq!(gaps.new_gaps.len(), 1);
        assert!((gaps.new_gaps[0].width() - 0.0005).abs() < 1e-9);
        assert!(gaps.new_gaps[0].width() >= gaps.atr * 0.1);

        let signal = *record.decision.signal().unwrap();
        assert_eq!(signal.direction, Direction::Buy);
        assert_eq!(signal.entry_price, 1.2010);
        assert_eq!(signal.stop_loss, 1.2000);
        assert_eq!(signal.entry_kind, EntryKind::FullMitigation);
        assert_eq!(signal.opportunity, GapKind::Gap);
        assert!((signal.position_size - 1.0).abs() < 1e-9);
        assert!((signal.take_profit - 1.2030).abs() < 1e-9);
        assert_eq!(engine.last_valid_bias(), Some(Bias::Bullish));
    }

    #[test]
    fn zero_stop_distance_is_discarded() {
        let mut engine = engine();
        // Stop anchor (middle low) equals the entry close.
        let record = engine.analyze_detailed(&rising_htf(), &ltf_with_gap(1.2010));
        assert!(matches!(record.decision, Decision::InvalidSignal { .. }));

        let mut engine = self::engine();
        assert!(engine.analyze(&rising_htf(), &ltf_with_gap(1.2010)).is_none());
    }

    #[test]
    fn analyze_is_idempotent_on_identical_input() {
        let mut engine = engine();
        let htf = rising_htf();
        let ltf = ltf_with_gap(1.2000);
        let first = engine.analyze(&htf, &ltf);
        let second = engine.analyze(&htf, &ltf);
        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(engine.gap_memory().plain().len(), 1);
    }

    #[test]
    fn inversion_signal_stop_is_on_the_loss_side() {
        let mut engine = engine();
        let mut ltf = ltf_with_gap(1.2000);
        // Last bar closes below the bullish gap: it becomes a sell inversion
        // gap, and the same bar trades back up into it.
        ltf[9] = bar(9, 1.2003, 1.1990, 1.1995);
        let record = engine.analyze_detailed(&rising_htf(), &ltf);

        assert_eq!(record.gaps.as_ref().unwrap().new_inversions.len(), 1);
        let signal = *record.decision.signal().unwrap();
        assert_eq!(signal.direction, Direction::Sell);
        assert_eq!(signal.opportunity, GapKind::InversionGap);
        assert_eq!(signal.entry_price, 1.1995);
        // High of the middle candle.
        assert_eq!(signal.stop_loss, 1.2014);
        assert!(signal.stop_loss > signal.entry_price);
        assert!(signal.take_profit < signal.entry_price);

        // A later bar through the stop is a loss of the full stop distance.
        let through = [bar(10, 1.2016, 1.1996, 1.2015)];
        let operation = paper::simulate(&signal, &through, engine.risk_config().pip_size);
        assert_eq!(operation.outcome, Outcome::Loss);
        assert!(operation.pips < 0.0);
    }

    #[test]
    fn repeated_window_reports_inversion_once() {
        let mut engine = engine();
        let mut ltf = ltf_with_gap(1.2000);
        ltf[9] = bar(9, 1.2003, 1.1990, 1.1995);
        let first = engine.analyze_detailed(&rising_htf(), &ltf);
        let second = engine.analyze_detailed(&rising_htf(), &ltf);

        assert_eq!(first.gaps.unwrap().new_inversions.len(), 1);
        assert!(second.gaps.unwrap().new_inversions.is_empty());
        assert!(engine.gap_memory().plain().is_empty());
        assert_eq!(engine.gap_memory().inverted().len(), 1);
    }

    #[test]
    fn short_htf_is_insufficient_data() {
        let mut engine = engine();
        let htf = rising_htf();
        let record = engine.analyze_detailed(&htf[..5], &ltf_with_gap(1.2000));
        assert_eq!(
            record.decision,
            Decision::InsufficientData { needed: engine.params().bias_window, got: 5 }
        );
        assert!(record.gaps.is_none());
    }

    #[test]
    fn short_ltf_is_insufficient_data() {
        let mut engine = engine();
        let ltf = ltf_with_gap(1.2000);
        let record = engine.analyze_detailed(&rising_htf(), &ltf[..4]);
        assert_eq!(record.decision, Decision::InsufficientData { needed: 5, got: 4 });
    }

    #[test]
    fn empty_series_is_no_data() {
        let mut engine = engine();
        let record = engine.analyze_detailed(&rising_htf(), &[]);
        assert_eq!(record.decision, Decision::NoData);
        assert!(record.bias.is_none());
    }

    #[test]
    fn state_survives_failed_calls() {
        let mut engine = engine();
        engine.analyze(&rising_htf(), &ltf_with_gap(1.2000));
        let remembered = engine.gap_memory().plain().len();

        engine.analyze(&rising_htf(), &[]);
        engine.analyze(&rising_htf()[..3], &ltf_with_gap(1.2000));

        assert_eq!(engine.gap_memory().plain().len(), remembered);
        assert_eq!(engine.last_valid_bias(), Some(Bias::Bullish));
        assert_eq!(engine.sequence(), 3);
    }

    #[test]
    fn quiet_last_bar_is_no_entry() {
        let mut engine = engine();
        let mut ltf = ltf_with_gap(1.2000);
        ltf[9] = bar(9, 1.2020, 1.2008, 1.2015);
        let record = engine.analyze_detailed(&rising_htf(), &ltf);
        assert_eq!(record.decision, Decision::NoEntry);
        assert_eq!(record.entry.unwrap().evaluated.len(), 1);
    }

    #[test]
    fn registered_operations_feed_statistics() {
        let mut engine = engine();
        let signal = engine.analyze(&rising_htf(), &ltf_with_gap(1.2000)).unwrap();
        engine.register_operation(Operation::pending(&signal));
        engine.register_operation(Operation { outcome: Outcome::Win, ..Operation::pending(&signal) });

        let stats = engine.statistics();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(engine.ledger().len(), 2);
    }
}
