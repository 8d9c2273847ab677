//! Rewrite trigger rules
//!
//! Deterministic rules over the latest finished evaluation of the parent
//! version. A trigger whose input metric is missing (for example after a
//! partial failure) is not evaluable and never fires; if no trigger is
//! evaluable the orchestrator refuses rather than firing spuriously.

use crate::pipeline::EvaluationReport;
use serde::{Deserialize, Serialize};

/// Overall AEO total below this fires `aeo_total_low`
pub const AEO_TOTAL_THRESHOLD: f64 = 70.0;

/// Answerability pillar below this fires `aeo_pillar_critical`
pub const ANSWERABILITY_THRESHOLD: f64 = 15.0;

/// Structure pillar below this fires `aeo_pillar_critical`
pub const STRUCTURE_THRESHOLD: f64 = 12.0;

/// AI-likeness total above this fires `ai_likeness_high`
pub const AI_TOTAL_THRESHOLD: f64 = 60.0;

/// Any AI-likeness category above this share of its max fires
/// `ai_category_critical`
pub const AI_CATEGORY_CRITICAL_RATIO: f64 = 0.70;

/// One fired trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteTrigger {
    /// aeo_total_low | aeo_pillar_critical | ai_likeness_high | ai_category_critical
    pub trigger_type: String,
    /// Metric that fired (pillar or category name, or the total)
    pub metric: String,
    /// Observed value
    pub value: f64,
    /// Threshold it crossed
    pub threshold: f64,
}

impl RewriteTrigger {
    /// Stable reason string stored on the cycle
    pub fn reason(&self) -> String {
        format!("{}:{}", self.trigger_type, self.metric)
    }
}

/// Metrics the trigger rules read, pulled out of a run's score rows
#[derive(Debug, Clone, Default)]
pub struct TriggerContext {
    pub aeo_total: Option<f64>,
    pub answerability: Option<f64>,
    pub structure: Option<f64>,
    pub ai_likeness_total: Option<f64>,
    /// (category name, score, max score)
    pub ai_categories: Vec<(String, f64, f64)>,
}

impl TriggerContext {
    /// True when no metric is present at all (nothing is evaluable).
    pub fn is_empty(&self) -> bool {
        self.aeo_total.is_none() && self.ai_likeness_total.is_none()
    }
}

/// Extract trigger inputs from an evaluation report.
pub fn build_trigger_context(report: &EvaluationReport) -> TriggerContext {
    let mut ctx = TriggerContext::default();

    if let Some(aeo) = report.aeo_scores.first() {
        ctx.aeo_total = Some(aeo.score);
        if let Some(pillars) = aeo.details.get("pillars") {
            ctx.answerability = pillar_score(pillars, "aeo_answerability");
            ctx.structure = pillar_score(pillars, "aeo_structure");
        }
    }

    if let Some(detector) = report
        .detector_scores
        .iter()
        .find(|d| d.provider == crate::scoring::ai_likeness::SCORER_ID)
        .or_else(|| report.detector_scores.first())
    {
        ctx.ai_likeness_total = Some(detector.score);
        if let Some(subscores) = detector
            .details
            .get("raw_response")
            .and_then(|r| r.get("subscores"))
            .and_then(|s| s.as_object())
        {
            for (name, category) in subscores {
                let score = category.get("score").and_then(|v| v.as_f64());
                let max = category.get("max_score").and_then(|v| v.as_f64());
                if let (Some(score), Some(max)) = (score, max) {
                    ctx.ai_categories.push((name.clone(), score, max));
                }
            }
        }
    }

    ctx
}

fn pillar_score(pillars: &serde_json::Value, key: &str) -> Option<f64> {
    pillars.get(key)?.get("score")?.as_f64()
}

/// Evaluate the trigger rules. Missing metrics never fire.
pub fn evaluate_triggers(ctx: &TriggerContext) -> Vec<RewriteTrigger> {
    let mut triggers = Vec::new();

    if let Some(total) = ctx.aeo_total {
        if total < AEO_TOTAL_THRESHOLD {
            triggers.push(RewriteTrigger {
                trigger_type: "aeo_total_low".to_string(),
                metric: "aeo_total".to_string(),
                value: total,
                threshold: AEO_TOTAL_THRESHOLD,
            });
        }
    }

    if let Some(answerability) = ctx.answerability {
        if answerability < ANSWERABILITY_THRESHOLD {
            triggers.push(RewriteTrigger {
                trigger_type: "aeo_pillar_critical".to_string(),
                metric: "aeo_answerability".to_string(),
                value: answerability,
                threshold: ANSWERABILITY_THRESHOLD,
            });
        }
    }

    if let Some(structure) = ctx.structure {
        if structure < STRUCTURE_THRESHOLD {
            triggers.push(RewriteTrigger {
                trigger_type: "aeo_pillar_critical".to_string(),
                metric: "aeo_structure".to_string(),
                value: structure,
                threshold: STRUCTURE_THRESHOLD,
            });
        }
    }

    if let Some(ai_total) = ctx.ai_likeness_total {
        if ai_total > AI_TOTAL_THRESHOLD {
            triggers.push(RewriteTrigger {
                trigger_type: "ai_likeness_high".to_string(),
                metric: "ai_likeness_total".to_string(),
                value: ai_total,
                threshold: AI_TOTAL_THRESHOLD,
            });
        }
    }

    for (name, score, max) in &ctx.ai_categories {
        if *max > 0.0 && *score > AI_CATEGORY_CRITICAL_RATIO * max {
            triggers.push(RewriteTrigger {
                trigger_type: "ai_category_critical".to_string(),
                metric: name.clone(),
                value: *score,
                threshold: AI_CATEGORY_CRITICAL_RATIO * max,
            });
        }
    }

    triggers
}
