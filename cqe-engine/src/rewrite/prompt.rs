//! Canonical rewrite prompt construction
//!
//! The template is filled deterministically from the parent content and the
//! fired triggers. The filled prompt is stored verbatim on the cycle before
//! the external call, so the audit trail always shows exactly what the
//! rewriter was asked to do.

use super::triggers::RewriteTrigger;
use std::fmt::Write;

/// Constant prohibitions section
const STRICT_PROHIBITIONS: &str = "\
STRICT PROHIBITIONS:
- Do not invent facts, statistics, quotes, or citations.
- Do not change the core claims or conclusions of the article.
- Do not add commentary about the rewrite or these instructions.
- Do not address the reader about this revision process.";

/// Constant output-requirements section
const OUTPUT_REQUIREMENTS: &str = "\
OUTPUT REQUIREMENTS:
- Return only the rewritten article body, in markdown.
- Keep the original language of the article.
- Preserve all factual content and every existing link.";

/// Fix directive for one trigger, from the fixed rule table.
fn fix_directive(trigger: &RewriteTrigger) -> String {
    match (trigger.trigger_type.as_str(), trigger.metric.as_str()) {
        ("aeo_total_low", _) => {
            "Raise overall answer-engine quality: lead with the direct answer, tighten the \
             structure, and replace vague statements with specifics."
                .to_string()
        }
        ("aeo_pillar_critical", "aeo_answerability") => {
            "Move the direct answer into the first 120 words. Start with the conclusion and \
             delete introductory filler."
                .to_string()
        }
        ("aeo_pillar_critical", "aeo_structure") => {
            "Restructure the content with H2/H3 headings and bullet lists so each section is \
             independently extractable."
                .to_string()
        }
        ("ai_likeness_high", _) => {
            "Vary sentence structure and length, add concrete examples and first-hand detail, \
             and cut stock phrasing."
                .to_string()
        }
        ("ai_category_critical", category) => match category {
            "predictability_entropy" => {
                "Broaden the vocabulary and vary word choice; avoid repeating the same terms."
                    .to_string()
            }
            "sentence_uniformity" => {
                "Mix short and long sentences and vary paragraph sizes.".to_string()
            }
            "generic_language" => {
                "Remove cliché phrases and buzzwords; say things plainly and specifically."
                    .to_string()
            }
            "structural_templates" => {
                "Rework the formulaic opening and reduce boilerplate transitions.".to_string()
            }
            "lack_of_friction" => {
                "Let natural voice through: contractions and direct address are fine."
                    .to_string()
            }
            "over_polish" => {
                "Drop hedging and disclaimers; commit to clear statements.".to_string()
            }
            other => format!("Address the '{other}' quality signal flagged by review."),
        },
        (other_type, metric) => {
            format!("Address the '{other_type}' finding on '{metric}'.")
        }
    }
}

/// Fill the canonical template.
pub fn build_prompt(parent_content: &str, triggers: &[RewriteTrigger]) -> String {
    let mut fixes = String::new();
    for (i, trigger) in triggers.iter().enumerate() {
        let _ = writeln!(
            fixes,
            "{}. {} (observed {:.2}, threshold {:.2})",
            i + 1,
            fix_directive(trigger),
            trigger.value,
            trigger.threshold
        );
    }

    format!(
        "You are revising an article that failed automated quality checks.\n\
         \n\
         ORIGINAL CONTENT:\n\
         <<<\n\
         {parent_content}\n\
         >>>\n\
         \n\
         REQUIRED FIXES:\n\
         {fixes}\
         \n\
         {STRICT_PROHIBITIONS}\n\
         \n\
         {OUTPUT_REQUIREMENTS}\n"
    )
}
