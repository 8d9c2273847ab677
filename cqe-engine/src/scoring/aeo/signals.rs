//! AEO signal extraction
//!
//! Purely extracts structural, statistical, and textual signals from markdown
//! content. Contains no scoring logic and makes no external calls.

use serde::{Deserialize, Serialize};

use crate::scoring::text;

/// Filler phrases that read as generic content
const FLUFF_PHRASES: &[&str] = &[
    "in today's world",
    "it is important to note",
    "needless to say",
    "at the end of the day",
    "all things considered",
    "last but not least",
    "in conclusion",
    "without further ado",
    "let's dive in",
    "game changer",
];

/// Word-count threshold above which a single line reads as a wall of text
const LONG_PARAGRAPH_WORDS: usize = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaSignals {
    pub word_count: usize,
    pub sentence_count: usize,
    /// Rounded to 2 decimals
    pub avg_sentence_length: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureSignals {
    pub h1_count: usize,
    pub h2_count: usize,
    pub h3_count: usize,
    pub list_item_count: usize,
    /// An H1 plus at least one H2 or H3
    pub has_proper_hierarchy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerFirstSignals {
    /// The raw lead window the answerability pillar evaluates
    pub first_120_words: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthoritySignals {
    pub link_count: usize,
    pub numeric_data_points: usize,
    /// Distinct 4-digit years in 1900-2099, ascending
    pub years_cited: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualitySignals {
    pub fluff_phrase_hits: usize,
    /// Phrase -> occurrence count, only phrases that hit
    pub fluff_details: std::collections::BTreeMap<String, usize>,
    pub long_paragraph_count: usize,
}

/// All deterministic signals extracted from one piece of content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AeoSignals {
    pub meta: MetaSignals,
    pub structure: StructureSignals,
    pub answer_first: AnswerFirstSignals,
    pub authority: AuthoritySignals,
    pub quality: QualitySignals,
}

/// Extract raw deterministic signals from markdown content.
pub fn extract_aeo_signals(content: &str) -> AeoSignals {
    if content.trim().is_empty() {
        return empty_signals();
    }

    let words: Vec<&str> = content.split_whitespace().collect();
    let word_count = words.len();

    let first_120_words = words
        .iter()
        .take(120)
        .copied()
        .collect::<Vec<_>>()
        .join(" ");

    let mut h1_count = 0;
    let mut h2_count = 0;
    let mut h3_count = 0;
    let mut list_item_count = 0;
    let mut long_paragraph_count = 0;

    for line in content.lines() {
        match heading_level(line) {
            Some(1) => h1_count += 1,
            Some(2) => h2_count += 1,
            Some(3) => h3_count += 1,
            _ => {}
        }
        if is_list_item(line) {
            list_item_count += 1;
        }
        if line.split_whitespace().count() > LONG_PARAGRAPH_WORDS {
            long_paragraph_count += 1;
        }
    }

    let content_lower = content.to_lowercase();
    let mut fluff_details = std::collections::BTreeMap::new();
    let mut fluff_phrase_hits = 0;
    for phrase in FLUFF_PHRASES {
        let hits = text::count_occurrences(&content_lower, phrase);
        if hits > 0 {
            fluff_details.insert(phrase.to_string(), hits);
            fluff_phrase_hits += hits;
        }
    }

    let link_count =
        text::count_occurrences(content, "https://") + text::count_occurrences(content, "http://");
    let numeric_data_points = text::count_numeric_facts(content);
    let years_cited = text::years_cited(content);

    let sentences = text::sentences(content);
    let sentence_count = sentences.len();
    let avg_sentence_length = if sentence_count == 0 {
        0.0
    } else {
        let raw = word_count as f64 / sentence_count as f64;
        (raw * 100.0).round() / 100.0
    };

    AeoSignals {
        meta: MetaSignals {
            word_count,
            sentence_count,
            avg_sentence_length,
        },
        structure: StructureSignals {
            h1_count,
            h2_count,
            h3_count,
            list_item_count,
            has_proper_hierarchy: h1_count > 0 && (h2_count > 0 || h3_count > 0),
        },
        answer_first: AnswerFirstSignals { first_120_words },
        authority: AuthoritySignals {
            link_count,
            numeric_data_points,
            years_cited,
        },
        quality: QualitySignals {
            fluff_phrase_hits,
            fluff_details,
            long_paragraph_count,
        },
    }
}

fn empty_signals() -> AeoSignals {
    AeoSignals {
        meta: MetaSignals {
            word_count: 0,
            sentence_count: 0,
            avg_sentence_length: 0.0,
        },
        structure: StructureSignals {
            h1_count: 0,
            h2_count: 0,
            h3_count: 0,
            list_item_count: 0,
            has_proper_hierarchy: false,
        },
        answer_first: AnswerFirstSignals {
            first_120_words: String::new(),
        },
        authority: AuthoritySignals {
            link_count: 0,
            numeric_data_points: 0,
            years_cited: Vec::new(),
        },
        quality: QualitySignals {
            fluff_phrase_hits: 0,
            fluff_details: std::collections::BTreeMap::new(),
            long_paragraph_count: 0,
        },
    }
}

/// Markdown ATX heading level (1-3) of a line, if any
fn heading_level(line: &str) -> Option<usize> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 3 {
        return None;
    }
    let rest = &line[hashes..];
    if rest.starts_with(char::is_whitespace) && !rest.trim().is_empty() {
        Some(hashes)
    } else {
        None
    }
}

/// Bullet (`-`, `*`) or numbered (`1.`) markdown list item with content
fn is_list_item(line: &str) -> bool {
    let trimmed = line.trim_start();
    if let Some(rest) = trimmed.strip_prefix('-').or_else(|| trimmed.strip_prefix('*')) {
        return rest.starts_with(char::is_whitespace) && !rest.trim().is_empty();
    }
    let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return false;
    }
    let rest = &trimmed[digits.len()..];
    rest.starts_with('.')
        && rest[1..].starts_with(char::is_whitespace)
        && !rest[1..].trim().is_empty()
}
