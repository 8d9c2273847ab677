//! AEO scoring engine (rubric v1.0.0)
//!
//! Deterministic scoring over seven pillars whose weights sum to 100:
//!
//! | Pillar                          | Max |
//! |---------------------------------|-----|
//! | Answerability & Intent Match    | 25  |
//! | Structural Extractability       | 20  |
//! | Specificity & Factual Density   | 20  |
//! | Trust & Authority               | 15  |
//! | Query Coverage Breadth          | 10  |
//! | Freshness                       | 5   |
//! | Machine Readability             | 5   |
//!
//! Signals are extracted by [`signals`]; this module only scores them.

pub mod signals;

use crate::scoring::{Scorer, ScorerOutput};
use cqe_common::{Error, Result};
use serde::{Deserialize, Serialize};

pub use signals::{extract_aeo_signals, AeoSignals};

/// Frozen rubric version
pub const RUBRIC_VERSION: &str = "1.0.0";

/// Registry id of the built-in scorer
pub const SCORER_ID: &str = "aeo_rubric";

/// Query intent the built-in scorer files its result under
pub const DEFAULT_QUERY_INTENT: &str = "general";

/// Score and reasons for a single pillar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PillarScore {
    pub score: f64,
    pub max_score: f64,
    pub reasons: Vec<String>,
}

impl PillarScore {
    fn new(score: f64, max_score: f64, reasons: Vec<String>) -> Self {
        Self {
            score: score.min(max_score),
            max_score,
            reasons,
        }
    }
}

/// All seven pillars, in rubric order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AeoPillars {
    pub aeo_answerability: PillarScore,
    pub aeo_structure: PillarScore,
    pub aeo_specificity: PillarScore,
    pub aeo_trust: PillarScore,
    pub aeo_coverage: PillarScore,
    pub aeo_freshness: PillarScore,
    pub aeo_readability: PillarScore,
}

/// Result of one AEO scoring call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AeoResult {
    /// 0.00-100.00, two decimals
    pub total_score: f64,
    pub rubric_version: String,
    pub pillars: AeoPillars,
    /// Raw extracted signals, persisted for audit
    pub signals: AeoSignals,
}

impl AeoResult {
    /// One-line rationale built from the leading reason of each pillar
    pub fn rationale(&self) -> String {
        [
            &self.pillars.aeo_answerability,
            &self.pillars.aeo_structure,
            &self.pillars.aeo_specificity,
            &self.pillars.aeo_trust,
            &self.pillars.aeo_coverage,
            &self.pillars.aeo_freshness,
            &self.pillars.aeo_readability,
        ]
        .iter()
        .filter_map(|p| p.reasons.first().cloned())
        .collect::<Vec<_>>()
        .join(" ")
    }

    /// JSON payload persisted as the AeoScore details column
    pub fn to_details_json(&self) -> serde_json::Value {
        serde_json::json!({
            "rubric_version": self.rubric_version,
            "pillars": self.pillars,
            "signals": self.signals,
        })
    }
}

/// Score content against the AEO rubric.
///
/// Pure and deterministic: the same content always produces the identical
/// total and pillar breakdown. Fails with `internal` if the pillar sum ever
/// exceeds 100.
pub fn score_aeo(content: &str) -> Result<AeoResult> {
    let signals = extract_aeo_signals(content);

    // Pillar 1: Answerability & Intent Match (max 25)
    let mut p1 = 0.0;
    let mut p1_reasons = Vec::new();
    if signals.answer_first.first_120_words.split_whitespace().count() > 20 {
        p1 += 15.0;
        p1_reasons.push("Content present in 'Answer First' window (first 120 words).".to_string());
    } else {
        p1_reasons.push("Introductory content is too sparse (< 20 words).".to_string());
    }
    if signals.structure.h1_count > 0 {
        p1 += 10.0;
        p1_reasons.push("H1 detected, signaling clear topic intent.".to_string());
    } else {
        p1_reasons.push("No H1 detected; topic intent unclear.".to_string());
    }
    let answerability = PillarScore::new(p1, 25.0, p1_reasons);

    // Pillar 2: Structural Extractability (max 20)
    let mut p2 = 0.0;
    let mut p2_reasons = Vec::new();
    if signals.structure.has_proper_hierarchy {
        p2 += 10.0;
        p2_reasons.push("Proper header hierarchy detected (H1 -> H2/H3).".to_string());
    } else {
        p2_reasons.push("Weak header hierarchy.".to_string());
    }
    let list_count = signals.structure.list_item_count;
    if list_count > 5 {
        p2 += 10.0;
        p2_reasons.push(format!("Strong use of lists ({list_count} items)."));
    } else if list_count > 0 {
        p2 += 5.0;
        p2_reasons.push(format!("Moderate use of lists ({list_count} items)."));
    } else {
        p2_reasons.push("No lists detected.".to_string());
    }
    let structure = PillarScore::new(p2, 20.0, p2_reasons);

    // Pillar 3: Specificity & Factual Density (max 20)
    let mut p3 = 0.0;
    let mut p3_reasons = Vec::new();
    let num_facts = signals.authority.numeric_data_points;
    if num_facts >= 3 {
        p3 += 10.0;
        p3_reasons.push(format!("High density of numeric facts ({num_facts})."));
    } else if num_facts > 0 {
        p3 += 5.0;
        p3_reasons.push(format!("Some numeric facts detected ({num_facts})."));
    } else {
        p3_reasons.push("No numeric data points found.".to_string());
    }
    if !signals.authority.years_cited.is_empty() {
        p3 += 10.0;
        p3_reasons.push("Specific temporal entities (years) detected.".to_string());
    } else if signals.meta.word_count > 600 {
        p3 += 5.0;
        p3_reasons.push(
            "Content length suggests detail, though specific entities low.".to_string(),
        );
    } else {
        p3_reasons.push("Low specificity/entity density.".to_string());
    }
    let specificity = PillarScore::new(p3, 20.0, p3_reasons);

    // Pillar 4: Trust & Authority (max 15)
    let mut p4 = 0.0;
    let mut p4_reasons = Vec::new();
    let links = signals.authority.link_count;
    if links >= 2 {
        p4 += 10.0;
        p4_reasons.push(format!("Strong citation profile ({links} external links)."));
    } else if links == 1 {
        p4 += 5.0;
        p4_reasons.push("Single citation detected.".to_string());
    } else {
        p4_reasons.push("No external citations.".to_string());
    }
    let fluff_hits = signals.quality.fluff_phrase_hits;
    if fluff_hits == 0 {
        p4 += 5.0;
        p4_reasons.push("Clean, concise language (0 fluff phrases).".to_string());
    } else {
        p4_reasons.push(format!("Fluff detected ({fluff_hits} instances). Penalty applied."));
    }
    let trust = PillarScore::new(p4, 15.0, p4_reasons);

    // Pillar 5: Query Coverage Breadth (max 10)
    let mut p5_reasons = Vec::new();
    let wc = signals.meta.word_count;
    let p5 = if wc > 800 {
        p5_reasons.push("Comprehensive depth (>800 words).".to_string());
        10.0
    } else if wc > 400 {
        p5_reasons.push("Moderate depth (>400 words).".to_string());
        6.0
    } else {
        p5_reasons.push(format!("Shallow coverage ({wc} words)."));
        2.0
    };
    let coverage = PillarScore::new(p5, 10.0, p5_reasons);

    // Pillar 6: Freshness & Temporal Clarity (max 5)
    let mut p6_reasons = Vec::new();
    let years = signals.authority.years_cited.len();
    let p6 = if years > 0 {
        p6_reasons.push(format!("Explicit temporal anchoring ({years} years detected)."));
        5.0
    } else {
        p6_reasons.push("No specific years mentioned.".to_string());
        0.0
    };
    let freshness = PillarScore::new(p6, 5.0, p6_reasons);

    // Pillar 7: Machine Readability (max 5)
    let mut p7_reasons = Vec::new();
    let avg_sl = signals.meta.avg_sentence_length;
    let p7 = if (10.0..=20.0).contains(&avg_sl) {
        p7_reasons.push(format!("Optimal sentence length ({avg_sl} words)."));
        5.0
    } else if avg_sl > 5.0 && avg_sl < 30.0 {
        p7_reasons.push(format!("Acceptable sentence length ({avg_sl} words)."));
        3.0
    } else {
        p7_reasons.push(format!("Sentence length suboptimal ({avg_sl} words)."));
        1.0
    };
    let readability = PillarScore::new(p7, 5.0, p7_reasons);

    let total = answerability.score
        + structure.score
        + specificity.score
        + trust.score
        + coverage.score
        + freshness.score
        + readability.score;
    let total = (total * 100.0).round() / 100.0;

    if total > 100.0 {
        return Err(Error::Internal(format!(
            "calculated AEO score {total} exceeds 100.0"
        )));
    }

    Ok(AeoResult {
        total_score: total,
        rubric_version: RUBRIC_VERSION.to_string(),
        pillars: AeoPillars {
            aeo_answerability: answerability,
            aeo_structure: structure,
            aeo_specificity: specificity,
            aeo_trust: trust,
            aeo_coverage: coverage,
            aeo_freshness: freshness,
            aeo_readability: readability,
        },
        signals,
    })
}

/// Built-in scorer wrapping [`score_aeo`]
#[derive(Debug, Default)]
pub struct AeoScorer;

impl Scorer for AeoScorer {
    fn id(&self) -> &'static str {
        SCORER_ID
    }

    fn version(&self) -> &'static str {
        RUBRIC_VERSION
    }

    fn score(&self, text: &str) -> Result<ScorerOutput> {
        let result = score_aeo(text)?;
        Ok(ScorerOutput::Aeo {
            query_intent: DEFAULT_QUERY_INTENT.to_string(),
            score: result.total_score,
            rationale: result.rationale(),
            details: result.to_details_json(),
        })
    }
}
