//! AI-likeness scoring engine (rubric v1.0.0)
//!
//! Pure, deterministic rubric over six categories:
//! 1. Predictability & Entropy (0-25)
//! 2. Sentence & Paragraph Uniformity (0-20)
//! 3. Generic Language & Clichés (0-20)
//! 4. Structural Template Signals (0-15)
//! 5. Lack of Human Friction (0-10)
//! 6. Over-Polish & Safety Tone (0-10)
//!
//! Total 0-100, higher = more AI-like. Every subscore carries concrete
//! textual evidence. All thresholds are literal constants frozen under
//! rubric version 1.0.0; changing any of them requires a version bump.

mod categories;

use crate::scoring::{text, Scorer, ScorerOutput};
use chrono::{DateTime, Utc};
use cqe_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Frozen rubric version
pub const RUBRIC_VERSION: &str = "1.0.0";

/// Model version string emitted in every result
pub const MODEL_VERSION: &str = "rubric_v1.0.0";

/// Registry id of the built-in scorer
pub const SCORER_ID: &str = "ai_likeness_rubric";

/// Score for a single rubric category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryScore {
    /// 0..=max_score for this category
    pub score: f64,
    pub max_score: f64,
    /// score / max_score * 100
    pub percentage: f64,
    /// Human-readable explanation with inline signal summaries
    pub explanation: String,
    /// Actual text snippets and counts that produced this score
    pub evidence: Vec<String>,
}

impl CategoryScore {
    fn new(score: f64, max_score: f64, explanation: String, evidence: Vec<String>) -> Self {
        Self {
            score,
            max_score,
            percentage: (score / max_score) * 100.0,
            explanation,
            evidence,
        }
    }
}

/// Per-category breakdown, in rubric order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscores {
    pub predictability_entropy: CategoryScore,
    pub sentence_uniformity: CategoryScore,
    pub generic_language: CategoryScore,
    pub structural_templates: CategoryScore,
    pub lack_of_friction: CategoryScore,
    pub over_polish: CategoryScore,
}

/// Input statistics recorded alongside the subscores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RubricMetadata {
    pub text_length: usize,
    pub word_count: usize,
}

/// Full rubric payload (`raw_response` in the persisted details)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RubricBreakdown {
    pub rubric_version: String,
    pub total_score: f64,
    pub subscores: Subscores,
    pub metadata: RubricMetadata,
}

/// Result of one AI-likeness scoring call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiLikenessResult {
    pub model_version: String,
    pub timestamp: DateTime<Utc>,
    /// Equal to raw_response.total_score
    pub score: f64,
    pub raw_response: RubricBreakdown,
}

impl AiLikenessResult {
    /// JSON payload persisted as the DetectorScore details column
    pub fn to_details_json(&self) -> serde_json::Value {
        serde_json::json!({
            "model_version": self.model_version,
            "timestamp": self.timestamp.to_rfc3339(),
            "raw_response": self.raw_response,
        })
    }
}

/// Score text against the AI-likeness rubric.
///
/// Deterministic modulo the timestamp. Fails with `validation` for empty
/// text or fewer than 5 whitespace-delimited tokens, and with `internal`
/// if the summed subscores ever exceed 100 (a scoring-logic bug, never
/// silently clamped).
pub fn score_ai_likeness(text_input: &str) -> Result<AiLikenessResult> {
    let trimmed = text_input.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("Text cannot be empty".to_string()));
    }
    if trimmed.split_whitespace().count() < 5 {
        return Err(Error::Validation(
            "Text too short (minimum 5 tokens required)".to_string(),
        ));
    }

    let words = text::words(trimmed);

    let predictability = categories::score_predictability_entropy(trimmed, &words);
    let uniformity = categories::score_sentence_uniformity(trimmed);
    let generic = categories::score_generic_language(trimmed, &words);
    let templates = categories::score_structural_templates(trimmed);
    let friction = categories::score_lack_of_friction(trimmed, &words);
    let polish = categories::score_over_polish(trimmed);

    let total = predictability.score
        + uniformity.score
        + generic.score
        + templates.score
        + friction.score
        + polish.score;

    // A total above 100 signals broken scoring logic. Never clamp.
    if total > 100.0 {
        return Err(Error::Internal(format!(
            "rubric scoring error: total_score={total:.2} exceeds maximum of 100.0"
        )));
    }

    Ok(AiLikenessResult {
        model_version: MODEL_VERSION.to_string(),
        timestamp: Utc::now(),
        score: total,
        raw_response: RubricBreakdown {
            rubric_version: RUBRIC_VERSION.to_string(),
            total_score: total,
            subscores: Subscores {
                predictability_entropy: predictability,
                sentence_uniformity: uniformity,
                generic_language: generic,
                structural_templates: templates,
                lack_of_friction: friction,
                over_polish: polish,
            },
            metadata: RubricMetadata {
                text_length: trimmed.len(),
                word_count: words.len(),
            },
        },
    })
}

/// Built-in scorer wrapping [`score_ai_likeness`]
#[derive(Debug, Default)]
pub struct AiLikenessScorer;

impl Scorer for AiLikenessScorer {
    fn id(&self) -> &'static str {
        SCORER_ID
    }

    fn version(&self) -> &'static str {
        MODEL_VERSION
    }

    fn score(&self, text: &str) -> Result<ScorerOutput> {
        let result = score_ai_likeness(text)?;
        Ok(ScorerOutput::Detector {
            provider: SCORER_ID.to_string(),
            score: result.score,
            details: result.to_details_json(),
        })
    }
}
