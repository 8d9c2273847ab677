//! Category scoring for the AI-likeness rubric
//!
//! All thresholds here are frozen under rubric version 1.0.0.

use super::CategoryScore;
use crate::scoring::text;
use std::collections::HashMap;

/// Common AI-generated phrases (matched case-insensitively)
const AI_PHRASES: &[&str] = &[
    "it's important to note",
    "it's worth noting",
    "it's crucial to",
    "it's essential to",
    "in today's world",
    "in today's digital age",
    "in conclusion",
    "to summarize",
    "in summary",
    "as an ai",
    "i don't have personal",
    "i cannot provide",
    "delve into",
    "dive into",
    "navigate the",
    "landscape of",
    "realm of",
    "tapestry of",
    "myriad of",
    "plethora of",
    "it's no secret that",
    "the fact of the matter",
    "at the end of the day",
    "game changer",
    "paradigm shift",
    "cutting edge",
    "state of the art",
    "leverage",
    "utilize",
    "facilitate",
    "optimize",
    "streamline",
    "robust",
    "comprehensive",
    "holistic",
    "synergy",
    "ecosystem",
];

/// Formulaic opening prefixes (matched case-insensitively against the first
/// sentence)
const TEMPLATE_OPENINGS: &[&str] = &[
    "in this article",
    "in this post",
    "in this guide",
    "in this blog",
    "welcome to",
    "introduction to",
    "have you ever",
    "are you",
    "do you",
    "imagine",
    "picture this",
    "consider",
    "let's explore",
    "let's discuss",
    "let's examine",
    "let's dive into",
    "let us explore",
    "let us discuss",
    "let us examine",
    "let us dive into",
];

/// Safety/hedging phrases
const SAFETY_PHRASES: &[&str] = &[
    "generally speaking",
    "in most cases",
    "typically",
    "usually",
    "often",
    "may be",
    "might be",
    "could be",
    "it depends",
    "varies depending",
    "consult a professional",
    "seek expert advice",
];

/// Disclaimer patterns
const DISCLAIMERS: &[&str] = &[
    "please note",
    "keep in mind",
    "be aware",
    "remember that",
    "it is important",
    "you should know",
];

/// Transition phrases. The transition adverbs (firstly, secondly, ...) also
/// count toward the adverb ratio in the generic-language category; they
/// signal both generic language and structural templates.
const TRANSITIONS: &[&str] = &[
    "firstly",
    "secondly",
    "thirdly",
    "finally",
    "moreover",
    "furthermore",
    "additionally",
    "in addition",
    "however",
    "nevertheless",
];

/// Informal markers whose absence signals machine polish
const INFORMAL_MARKERS: &[&str] = &["lol", "haha", "omg", "btw", "tbh", "...", "!!", "??"];

/// Category 1: Predictability & Entropy (0-25)
///
/// Lexical diversity (10), word-length variance (8), repetition (7).
pub fn score_predictability_entropy(_text: &str, words: &[&str]) -> CategoryScore {
    const MAX: f64 = 25.0;

    if words.len() < 10 {
        return CategoryScore::new(
            0.0,
            MAX,
            "Text too short to analyze entropy (< 10 words)".to_string(),
            Vec::new(),
        );
    }

    let mut signals = Vec::new();
    let mut evidence = Vec::new();
    let mut score = 0.0;

    // 1. Lexical diversity (10 points)
    let lowered: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();
    let unique: std::collections::HashSet<&str> = lowered.iter().map(String::as_str).collect();
    let lexical_diversity = unique.len() as f64 / words.len() as f64;

    if lexical_diversity < 0.4 {
        score += 10.0;
        signals.push(format!("Very low lexical diversity ({lexical_diversity:.2})"));
    } else if lexical_diversity < 0.5 {
        score += 7.0;
        signals.push(format!("Low lexical diversity ({lexical_diversity:.2})"));
    } else if lexical_diversity < 0.6 {
        score += 4.0;
        signals.push(format!("Moderate lexical diversity ({lexical_diversity:.2})"));
    } else {
        signals.push(format!("High lexical diversity ({lexical_diversity:.2})"));
    }

    // 2. Word length variance (8 points)
    let lengths: Vec<f64> = words.iter().map(|w| w.chars().count() as f64).collect();
    let std_dev = text::std_dev(&lengths);

    if std_dev < 2.0 {
        score += 8.0;
        signals.push(format!("Very uniform word lengths (σ={std_dev:.2})"));
    } else if std_dev < 2.5 {
        score += 5.0;
        signals.push(format!("Low word length variance (σ={std_dev:.2})"));
    } else {
        signals.push(format!("Natural word length variance (σ={std_dev:.2})"));
    }

    // 3. Repetition patterns (7 points)
    let mut freq: HashMap<&str, usize> = HashMap::new();
    for w in &lowered {
        *freq.entry(w.as_str()).or_insert(0) += 1;
    }
    // deterministic tie-break: highest count, then lexicographic
    let most_common = freq
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
        .map(|(w, c)| (w.to_string(), *c))
        .unwrap_or_default();
    let repetition_ratio = most_common.1 as f64 / words.len() as f64;

    if repetition_ratio > 0.05 {
        score += 7.0;
        signals.push(format!(
            "High word repetition: '{}' ({:.2}%)",
            most_common.0,
            repetition_ratio * 100.0
        ));
        evidence.push(format!("Most repeated: '{}' ({}x)", most_common.0, most_common.1));
    } else if repetition_ratio > 0.03 {
        score += 4.0;
        signals.push(format!(
            "Moderate word repetition: '{}' ({:.2}%)",
            most_common.0,
            repetition_ratio * 100.0
        ));
        evidence.push(format!("Most repeated: '{}' ({}x)", most_common.0, most_common.1));
    } else {
        signals.push(format!("Low word repetition ({:.2}%)", repetition_ratio * 100.0));
    }

    CategoryScore::new(score, MAX, signals.join(" | "), evidence)
}

/// Category 2: Sentence & Paragraph Uniformity (0-20)
///
/// Sentence-length CV (12), paragraph-length CV (8).
pub fn score_sentence_uniformity(input: &str) -> CategoryScore {
    const MAX: f64 = 20.0;

    let sentences = text::sentences(input);
    if sentences.len() < 3 {
        return CategoryScore::new(
            0.0,
            MAX,
            "Text too short to analyze uniformity (< 3 sentences)".to_string(),
            Vec::new(),
        );
    }

    let mut signals = Vec::new();
    let mut evidence = Vec::new();
    let mut score = 0.0;

    // 1. Sentence length uniformity (12 points)
    let sentence_lengths: Vec<f64> = sentences
        .iter()
        .map(|s| s.split_whitespace().count() as f64)
        .collect();
    let avg_sent_length = text::mean(&sentence_lengths);
    let cv = text::coefficient_of_variation(&sentence_lengths);

    if cv < 0.3 {
        score += 12.0;
        signals.push(format!("Very uniform sentence lengths (CV={cv:.2})"));
        let preview: Vec<usize> = sentence_lengths.iter().take(5).map(|l| *l as usize).collect();
        evidence.push(format!(
            "Sentence lengths: {preview:?} (avg={avg_sent_length:.1})"
        ));
    } else if cv < 0.5 {
        score += 7.0;
        signals.push(format!("Moderately uniform sentences (CV={cv:.2})"));
    } else {
        signals.push(format!("Natural sentence length variance (CV={cv:.2})"));
    }

    // 2. Paragraph uniformity (8 points)
    let paragraphs = text::paragraphs(input);
    if paragraphs.len() >= 3 {
        let para_lengths: Vec<f64> = paragraphs
            .iter()
            .map(|p| p.split_whitespace().count() as f64)
            .collect();
        let avg_para_length = text::mean(&para_lengths);
        let para_cv = text::coefficient_of_variation(&para_lengths);

        if para_cv < 0.3 {
            score += 8.0;
            signals.push(format!("Very uniform paragraph lengths (CV={para_cv:.2})"));
            let preview: Vec<usize> = para_lengths.iter().take(3).map(|l| *l as usize).collect();
            evidence.push(format!(
                "Paragraph lengths: {preview:?} (avg={avg_para_length:.1})"
            ));
        } else if para_cv < 0.5 {
            score += 4.0;
            signals.push(format!("Moderately uniform paragraphs (CV={para_cv:.2})"));
        } else {
            signals.push(format!("Natural paragraph variance (CV={para_cv:.2})"));
        }
    } else {
        signals.push("Too few paragraphs to analyze uniformity".to_string());
    }

    CategoryScore::new(score, MAX, signals.join(" | "), evidence)
}

/// Category 3: Generic Language & Clichés (0-20)
///
/// AI phrase count (15), adverb ratio (5).
pub fn score_generic_language(input: &str, words: &[&str]) -> CategoryScore {
    const MAX: f64 = 20.0;

    let text_lower = input.to_lowercase();
    let mut signals = Vec::new();
    let mut evidence = Vec::new();
    let mut score = 0.0;

    // 1. AI phrase detection (15 points)
    let found: Vec<&str> = AI_PHRASES
        .iter()
        .copied()
        .filter(|p| text_lower.contains(p))
        .collect();
    let phrase_count = found.len();

    if phrase_count >= 5 {
        score += 15.0;
        let sample = found
            .iter()
            .take(3)
            .map(|p| format!("'{p}'"))
            .collect::<Vec<_>>()
            .join(", ");
        signals.push(format!("Found {phrase_count} AI-like phrases: {sample}..."));
        evidence.extend(found.iter().take(5).map(|p| p.to_string()));
    } else if phrase_count >= 3 {
        score += 10.0;
        let sample = found
            .iter()
            .map(|p| format!("'{p}'"))
            .collect::<Vec<_>>()
            .join(", ");
        signals.push(format!("Found {phrase_count} AI-like phrases: {sample}"));
        evidence.extend(found.iter().map(|p| p.to_string()));
    } else if phrase_count >= 1 {
        score += 5.0;
        let sample = found
            .iter()
            .map(|p| format!("'{p}'"))
            .collect::<Vec<_>>()
            .join(", ");
        signals.push(format!("Found {phrase_count} AI-like phrase(s): {sample}"));
        evidence.extend(found.iter().map(|p| p.to_string()));
    } else {
        signals.push("No common AI phrases detected".to_string());
    }

    // 2. Adverb overuse (5 points)
    let adverbs: Vec<String> = words
        .iter()
        .filter(|w| w.len() >= 3 && w.to_lowercase().ends_with("ly"))
        .map(|w| w.to_lowercase())
        .collect();
    let adverb_ratio = if words.is_empty() {
        0.0
    } else {
        adverbs.len() as f64 / words.len() as f64
    };

    if adverb_ratio > 0.05 {
        score += 5.0;
        let sample = adverbs.iter().take(5).cloned().collect::<Vec<_>>().join(", ");
        signals.push(format!(
            "High adverb usage ({:.2}%): {sample}...",
            adverb_ratio * 100.0
        ));
        evidence.push(format!("Adverbs: {sample}"));
    } else if adverb_ratio > 0.03 {
        score += 2.0;
        signals.push(format!("Moderate adverb usage ({:.2}%)", adverb_ratio * 100.0));
    } else {
        signals.push(format!("Normal adverb usage ({:.2}%)", adverb_ratio * 100.0));
    }

    CategoryScore::new(score, MAX, signals.join(" | "), evidence)
}

/// Category 4: Structural Template Signals (0-15)
///
/// Formulaic opening (8), numbered-list density (4), transition phrases (3).
pub fn score_structural_templates(input: &str) -> CategoryScore {
    const MAX: f64 = 15.0;

    let mut signals = Vec::new();
    let mut evidence = Vec::new();
    let mut score = 0.0;

    // 1. Formulaic openings (8 points)
    let first_sentence = match input.find('.') {
        Some(pos) => &input[..pos],
        None => {
            let end = input
                .char_indices()
                .nth(200)
                .map(|(i, _)| i)
                .unwrap_or(input.len());
            &input[..end]
        }
    };
    let opening_lower = first_sentence.trim_start().to_lowercase();
    let is_formulaic = TEMPLATE_OPENINGS.iter().any(|p| opening_lower.starts_with(p));

    if is_formulaic {
        score += 8.0;
        let snippet: String = if first_sentence.chars().count() > 60 {
            let cut: String = first_sentence.chars().take(60).collect();
            format!("{cut}...")
        } else {
            first_sentence.to_string()
        };
        signals.push(format!("Formulaic opening: '{snippet}'"));
        evidence.push(format!("Opening: '{snippet}'"));
    } else {
        signals.push("Natural opening".to_string());
    }

    // 2. Numbered lists (4 points)
    let numbered_items = input
        .lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                return false;
            }
            let rest = &trimmed[digits.len()..];
            (rest.starts_with('.') || rest.starts_with(')'))
                && rest[1..].starts_with(char::is_whitespace)
        })
        .count();

    if numbered_items >= 5 {
        score += 4.0;
        signals.push(format!("Heavy list structure ({numbered_items} items)"));
        evidence.push(format!("Numbered list items: {numbered_items}"));
    } else if numbered_items >= 3 {
        score += 2.0;
        signals.push(format!("Moderate list structure ({numbered_items} items)"));
        evidence.push(format!("Numbered list items: {numbered_items}"));
    } else {
        signals.push("Minimal list structure".to_string());
    }

    // 3. Transition phrases (3 points)
    let text_lower = input.to_lowercase();
    let found_transitions: Vec<&str> = TRANSITIONS
        .iter()
        .copied()
        .filter(|t| text_lower.contains(t))
        .collect();
    let transition_count = found_transitions.len();

    if transition_count >= 4 {
        score += 3.0;
        let sample = found_transitions
            .iter()
            .take(4)
            .map(|t| format!("'{t}'"))
            .collect::<Vec<_>>()
            .join(", ");
        signals.push(format!("Heavy transition usage: {sample}"));
        evidence.extend(found_transitions.iter().take(4).map(|t| t.to_string()));
    } else if transition_count >= 2 {
        score += 1.5;
        let sample = found_transitions
            .iter()
            .map(|t| format!("'{t}'"))
            .collect::<Vec<_>>()
            .join(", ");
        signals.push(format!("Moderate transition usage: {sample}"));
        evidence.extend(found_transitions.iter().map(|t| t.to_string()));
    } else {
        signals.push("Minimal transition usage".to_string());
    }

    CategoryScore::new(score, MAX, signals.join(" | "), evidence)
}

/// Category 5: Lack of Human Friction (0-10)
///
/// Perfect capitalization (4), contraction absence (3), informal-marker
/// absence (3).
pub fn score_lack_of_friction(input: &str, words: &[&str]) -> CategoryScore {
    const MAX: f64 = 10.0;

    let mut signals = Vec::new();
    let mut evidence = Vec::new();
    let mut score = 0.0;

    // 1. Perfect capitalization (4 points)
    let sentences = text::sentences(input);
    if !sentences.is_empty() {
        let capitalized = sentences
            .iter()
            .filter(|s| s.chars().next().is_some_and(char::is_uppercase))
            .count();
        let cap_ratio = capitalized as f64 / sentences.len() as f64;

        if cap_ratio == 1.0 && sentences.len() >= 3 {
            score += 4.0;
            signals.push("Perfect sentence capitalization".to_string());
            evidence.push(format!("All {} sentences capitalized", sentences.len()));
        } else {
            signals.push(format!("Natural capitalization ({:.0}%)", cap_ratio * 100.0));
        }
    } else {
        signals.push("No sentences to analyze".to_string());
    }

    // 2. Lack of contractions (3 points)
    let contractions = text::count_contractions(input);
    let contraction_ratio = if words.is_empty() {
        0.0
    } else {
        contractions as f64 / words.len() as f64
    };

    if contraction_ratio < 0.01 {
        score += 3.0;
        signals.push("Very few contractions (formal)".to_string());
        evidence.push(format!("Contractions: {}/{} words", contractions, words.len()));
    } else if contraction_ratio < 0.02 {
        score += 1.5;
        signals.push("Few contractions".to_string());
    } else {
        signals.push(format!(
            "Natural contraction usage ({:.2}%)",
            contraction_ratio * 100.0
        ));
    }

    // 3. Lack of informal markers (3 points)
    let text_lower = input.to_lowercase();
    let found_informal: Vec<&str> = INFORMAL_MARKERS
        .iter()
        .copied()
        .filter(|m| text_lower.contains(m))
        .collect();

    if found_informal.is_empty() && words.len() > 50 {
        score += 3.0;
        signals.push("No informal markers (very formal)".to_string());
        evidence.push("No informal markers found".to_string());
    } else if !found_informal.is_empty() {
        let sample = found_informal
            .iter()
            .take(3)
            .map(|m| format!("'{m}'"))
            .collect::<Vec<_>>()
            .join(", ");
        signals.push(format!("Natural informality: {sample}"));
    }

    CategoryScore::new(score, MAX, signals.join(" | "), evidence)
}

/// Category 6: Over-Polish & Safety Tone (0-10)
///
/// Hedging phrases (7), disclaimers (3).
pub fn score_over_polish(input: &str) -> CategoryScore {
    const MAX: f64 = 10.0;

    let text_lower = input.to_lowercase();
    let mut signals = Vec::new();
    let mut evidence = Vec::new();
    let mut score = 0.0;

    // 1. Safety/hedging phrases (7 points)
    let found_safety: Vec<&str> = SAFETY_PHRASES
        .iter()
        .copied()
        .filter(|p| text_lower.contains(p))
        .collect();
    let safety_count = found_safety.len();

    if safety_count >= 4 {
        score += 7.0;
        let sample = found_safety
            .iter()
            .take(4)
            .map(|p| format!("'{p}'"))
            .collect::<Vec<_>>()
            .join(", ");
        signals.push(format!("Heavy hedging language: {sample}"));
        evidence.extend(found_safety.iter().take(4).map(|p| p.to_string()));
    } else if safety_count >= 2 {
        score += 4.0;
        let sample = found_safety
            .iter()
            .map(|p| format!("'{p}'"))
            .collect::<Vec<_>>()
            .join(", ");
        signals.push(format!("Moderate hedging: {sample}"));
        evidence.extend(found_safety.iter().map(|p| p.to_string()));
    } else if safety_count >= 1 {
        score += 2.0;
        let sample = found_safety
            .iter()
            .map(|p| format!("'{p}'"))
            .collect::<Vec<_>>()
            .join(", ");
        signals.push(format!("Some hedging: {sample}"));
        evidence.extend(found_safety.iter().map(|p| p.to_string()));
    } else {
        signals.push("No hedging detected".to_string());
    }

    // 2. Disclaimer patterns (3 points)
    let found_disclaimers: Vec<&str> = DISCLAIMERS
        .iter()
        .copied()
        .filter(|d| text_lower.contains(d))
        .collect();
    let disclaimer_count = found_disclaimers.len();

    if disclaimer_count >= 2 {
        score += 3.0;
        let sample = found_disclaimers
            .iter()
            .map(|d| format!("'{d}'"))
            .collect::<Vec<_>>()
            .join(", ");
        signals.push(format!("Multiple disclaimers: {sample}"));
        evidence.extend(found_disclaimers.iter().map(|d| d.to_string()));
    } else if disclaimer_count >= 1 {
        score += 1.5;
        let sample = found_disclaimers
            .iter()
            .map(|d| format!("'{d}'"))
            .collect::<Vec<_>>()
            .join(", ");
        signals.push(format!("Some disclaimers: {sample}"));
        evidence.extend(found_disclaimers.iter().map(|d| d.to_string()));
    } else {
        signals.push("No disclaimers".to_string());
    }

    CategoryScore::new(score, MAX, signals.join(" | "), evidence)
}
