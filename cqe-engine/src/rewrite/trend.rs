//! Trend classification and loop-breaking rules

use cqe_common::db::models::{RewriteCycle, RewriteStatus, TrendOutcome};

/// Minimum score movement that counts as a real change
const TREND_DELTA: f64 = 5.0;

/// Child AEO totals of the last cycles must span at least this much,
/// otherwise the loop is oscillating
const OSCILLATION_SPAN: f64 = 3.0;

/// Cycles per parent version before the loop stops
pub const MAX_CYCLES_PER_PARENT: i64 = 3;

/// How many trailing child AEO totals the oscillation check looks at
const OSCILLATION_WINDOW: usize = 3;

/// Classify the score trend of a finished cycle.
///
/// `aeo_delta = child_aeo - parent_aeo`; `ai_delta = parent_ai - child_ai`
/// (lower AI-likeness is better). Returns None when any input is missing;
/// a trend over partial data would be a guess.
pub fn classify_trend(
    parent_aeo: Option<f64>,
    parent_ai: Option<f64>,
    child_aeo: Option<f64>,
    child_ai: Option<f64>,
) -> Option<TrendOutcome> {
    let (parent_aeo, parent_ai, child_aeo, child_ai) =
        (parent_aeo?, parent_ai?, child_aeo?, child_ai?);

    let aeo_delta = child_aeo - parent_aeo;
    let ai_delta = parent_ai - child_ai;

    let outcome = if aeo_delta >= TREND_DELTA && ai_delta >= TREND_DELTA {
        TrendOutcome::Improving
    } else if aeo_delta >= TREND_DELTA {
        TrendOutcome::PartialImprovement
    } else if aeo_delta > -TREND_DELTA {
        TrendOutcome::Stagnant
    } else {
        TrendOutcome::Regressing
    };

    // An AI-likeness collapse overrides a flat AEO reading.
    if outcome == TrendOutcome::Stagnant && ai_delta <= -TREND_DELTA {
        return Some(TrendOutcome::Regressing);
    }

    Some(outcome)
}

/// A fired loop-breaking rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopRule {
    MaxCyclesReached,
    NoImprovement,
    QualityDegradation,
    OscillationDetected,
}

impl StopRule {
    pub fn stop_reason(&self) -> &'static str {
        match self {
            StopRule::MaxCyclesReached => "max_cycles_reached",
            StopRule::NoImprovement => "no_improvement",
            StopRule::QualityDegradation => "quality_degradation",
            StopRule::OscillationDetected => "oscillation_detected",
        }
    }
}

/// Evaluate the loop-breaking rules before producing the next cycle.
///
/// `next_cycle_number` is the number the new cycle would get for its parent;
/// `history` is the blog's cycles, oldest first.
pub fn check_stop_rules(next_cycle_number: i64, history: &[RewriteCycle]) -> Option<StopRule> {
    if next_cycle_number > MAX_CYCLES_PER_PARENT {
        return Some(StopRule::MaxCyclesReached);
    }

    let finished: Vec<&RewriteCycle> = history
        .iter()
        .filter(|c| c.rewrite_status == RewriteStatus::Completed)
        .collect();

    if let Some(last) = finished.last() {
        if last.trend_outcome == Some(TrendOutcome::Regressing) {
            return Some(StopRule::QualityDegradation);
        }
    }

    if finished.len() >= 2 {
        let last_two = &finished[finished.len() - 2..];
        if last_two
            .iter()
            .all(|c| c.trend_outcome == Some(TrendOutcome::Stagnant))
        {
            return Some(StopRule::NoImprovement);
        }
    }

    let recent_totals: Vec<f64> = finished
        .iter()
        .rev()
        .take(OSCILLATION_WINDOW)
        .filter_map(|c| c.child_aeo_total)
        .collect();
    if recent_totals.len() == OSCILLATION_WINDOW {
        let max = recent_totals.iter().cloned().fold(f64::MIN, f64::max);
        let min = recent_totals.iter().cloned().fold(f64::MAX, f64::min);
        if max - min < OSCILLATION_SPAN {
            return Some(StopRule::OscillationDetected);
        }
    }

    None
}
