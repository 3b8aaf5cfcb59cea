use tracing::{debug, info};

use common::{Candle, Direction, EntryKind, EntrySetup, Gap};

/// Checks the latest candle against remembered gaps.
#[derive(Debug, Clone)]
pub struct EntryEvaluator {
    tolerance: f64,
}

/// Result of one evaluation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDecision {
    pub setup: Option<EntrySetup>,
    pub matched: Option<Gap>,
    /// Gaps tested, in order, up to and including the match.
    pub evaluated: Vec<Gap>,
}

impl EntryEvaluator {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Test opportunities in order; the first one that triggers wins and
    /// nothing after it is looked at.
    pub fn evaluate<'a>(&self, recent: &Candle, opportunities: impl IntoIterator<Item = &'a Gap>) -> EntryDecision {
        let mut evaluated = Vec::new();

        for gap in opportunities {
            evaluated.push(*gap);
            let Some(kind) = self.trigger(recent, gap) else {
                continue;
            };

            info!(
                direction = %gap.direction,
                opportunity = %gap.kind,
                reason = %kind,
                entry = recent.close,
                stop = gap.stop_anchor(),
                "Entry triggered"
            );
            return EntryDecision {
                setup: Some(EntrySetup {
                    direction: gap.direction,
                    entry_price: recent.close,
                    stop_loss: gap.stop_anchor(),
                    timestamp: recent.timestamp,
                    opportunity: gap.kind,
                    entry_kind: kind,
                }),
                matched: Some(*gap),
                evaluated,
            };
        }

        debug!(evaluated = evaluated.len(), "No gap mitigated or within tolerance");
        EntryDecision { setup: None, matched: None, evaluated }
    }

    /// Which entry condition, if any, `recent` satisfies for `gap`.
    ///
    /// Buy: full mitigation (low reaches the top, close holds above the
    /// bottom), then a midpoint touch with a close above it, then a low within
    /// tolerance of the top. Sell mirrors this on the high.
    ///
    /// The midpoint lies inside the gap, so any candle meeting the midpoint
    /// condition also meets full mitigation and is reported as such. The
    /// midpoint branch only documents the precedence order.
    pub fn trigger(&self, recent: &Candle, gap: &Gap) -> Option<EntryKind> {
        let ce = gap.midpoint();
        match gap.direction {
            Direction::Buy => {
                if recent.low <= gap.upper && recent.close > gap.lower {
                    Some(EntryKind::FullMitigation)
                } else if recent.low <= ce && recent.close > ce {
                    Some(EntryKind::ConsequentEncroachment)
                } else if (recent.low - gap.upper).abs() <= self.tolerance {
                    Some(EntryKind::Proximity)
                } else {
                    None
                }
            }
            Direction::Sell => {
                if recent.high >= gap.lower && recent.close < gap.upper {
                    Some(EntryKind::FullMitigation)
                } else if recent.high >= ce && recent.close < ce {
                    Some(EntryKind::ConsequentEncroachment)
                } else if (recent.high - gap.lower).abs() <= self.tolerance {
                    Some(EntryKind::Proximity)
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use common::GapKind;

    fn recent(high: f64, low: f64, close: f64) -> Candle {
        Candle {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap(),
            open: close,
            high,
            low,
            close,
            volume: 3.0,
        }
    }

    fn gap(direction: Direction, upper: f64, lower: f64, stop_anchor: f64) -> Gap {
        Gap {
            direction,
            upper,
            lower,
            middle_high: stop_anchor,
            middle_low: stop_anchor,
            source_index: 4,
            formed_at: Utc.with_ymd_and_hms(2024, 3, 4, 14, 4, 0).unwrap(),
            kind: GapKind::Gap,
        }
    }

    #[test]
    fn full_mitigation_buy() {
        let evaluator = EntryEvaluator::new(0.00015);
        let g = gap(Direction::Buy, 1.2005, 1.2000, 1.1990);
        let decision = evaluator.evaluate(&recent(1.2012, 1.2003, 1.2010), [&g]);
        let setup = decision.setup.unwrap();
        assert_eq!(setup.direction, Direction::Buy);
        assert_eq!(setup.entry_price, 1.2010);
        assert_eq!(setup.stop_loss, 1.1990);
        assert_eq!(setup.entry_kind, EntryKind::FullMitigation);
        assert_eq!(decision.matched, Some(g));
    }

    #[test]
    fn proximity_buy_when_low_hovers_above_gap() {
        let evaluator = EntryEvaluator::new(0.00015);
        let g = gap(Direction::Buy, 1.2005, 1.2000, 1.1990);
        // low 1.2006 is 0.0001 above the top of the gap
        let kind = evaluator.trigger(&recent(1.2015, 1.2006, 1.2012), &g);
        assert_eq!(kind, Some(EntryKind::Proximity));
    }

    #[test]
    fn close_below_gap_is_no_entry() {
        let evaluator = EntryEvaluator::new(0.00015);
        let g = gap(Direction::Buy, 1.2005, 1.2000, 1.1990);
        assert_eq!(evaluator.trigger(&recent(1.2003, 1.1980, 1.1985), &g), None);
    }

    #[test]
    fn full_mitigation_sell() {
        let evaluator = EntryEvaluator::new(0.00015);
        let g = gap(Direction::Sell, 1.2000, 1.1995, 1.2004);
        let kind = evaluator.trigger(&recent(1.1997, 1.1985, 1.1990), &g);
        assert_eq!(kind, Some(EntryKind::FullMitigation));
    }

    #[test]
    fn midpoint_touch_reports_full_mitigation() {
        let evaluator = EntryEvaluator::new(0.00015);
        let buy = gap(Direction::Buy, 1.2010, 1.2000, 1.1990);
        // low 1.2004 reaches below the midpoint 1.2005, close 1.2008 above it
        assert_eq!(
            evaluator.trigger(&recent(1.2012, 1.2004, 1.2008), &buy),
            Some(EntryKind::FullMitigation)
        );
        let sell = gap(Direction::Sell, 1.2010, 1.2000, 1.2020);
        assert_eq!(
            evaluator.trigger(&recent(1.2006, 1.1998, 1.2002), &sell),
            Some(EntryKind::FullMitigation)
        );
    }

    #[test]
    fn proximity_sell() {
        let evaluator = EntryEvaluator::new(0.00015);
        let g = gap(Direction::Sell, 1.2000, 1.1995, 1.2004);
        let kind = evaluator.trigger(&recent(1.1994, 1.1980, 1.1985), &g);
        assert_eq!(kind, Some(EntryKind::Proximity));
    }

    #[test]
    fn first_matching_opportunity_wins() {
        let evaluator = EntryEvaluator::new(0.00015);
        let far = gap(Direction::Buy, 1.3005, 1.3000, 1.2990);
        let first = gap(Direction::Buy, 1.2005, 1.2000, 1.1990);
        let second = Gap { middle_low: 1.1900, middle_high: 1.1900, kind: GapKind::InversionGap, ..first };
        let decision = evaluator.evaluate(&recent(1.2012, 1.2003, 1.2010), [&far, &first, &second]);

        assert_eq!(decision.evaluated.len(), 2);
        assert_eq!(decision.setup.unwrap().stop_loss, 1.1990);
        assert_eq!(decision.setup.unwrap().opportunity, GapKind::Gap);
    }

    #[test]
    fn no_match_records_everything_evaluated() {
        let evaluator = EntryEvaluator::new(0.00015);
        let a = gap(Direction::Buy, 1.3005, 1.3000, 1.2990);
        let b = gap(Direction::Sell, 1.1005, 1.1000, 1.1010);
        let decision = evaluator.evaluate(&recent(1.2012, 1.2003, 1.2010), [&a, &b]);
        assert!(decision.setup.is_none());
        assert!(decision.matched.is_none());
        assert_eq!(decision.evaluated, vec![a, b]);
    }
}
