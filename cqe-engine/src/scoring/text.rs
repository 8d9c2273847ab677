//! Shared text analysis primitives for the scoring engines
//!
//! Everything here is deterministic and allocation-light. Word extraction
//! follows the word-character convention (runs of alphanumerics or
//! underscore); sentence splitting treats any run of `.`, `!`, `?` as one
//! terminator.

/// Extract words: maximal runs of alphanumeric characters or underscore.
pub fn words(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in text.char_indices() {
        if c.is_alphanumeric() || c == '_' {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(s) = start.take() {
            out.push(&text[s..i]);
        }
    }
    if let Some(s) = start {
        out.push(&text[s..]);
    }
    out
}

/// Split into sentences on runs of `.`, `!`, `?`; trimmed, empties dropped.
pub fn sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Split into paragraphs on blank-line boundaries; trimmed, empties dropped.
pub fn paragraphs(text: &str) -> Vec<&str> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; 0.0 for an empty slice.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let avg = mean(values);
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Coefficient of variation; 0.0 when the mean is 0.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let avg = mean(values);
    if avg == 0.0 {
        return 0.0;
    }
    std_dev(values) / avg
}

/// Count non-overlapping occurrences of `needle` in `haystack`.
pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.match_indices(needle).count()
}

/// Count digit runs that start at a word boundary (the previous character is
/// not a word character). A run may continue with a decimal fraction and an
/// optional percent sign; those only extend the match, never split it.
pub fn count_numeric_facts(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut count = 0;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_digit() {
            let boundary = i == 0 || {
                let p = bytes[i - 1] as char;
                !(p.is_ascii_alphanumeric() || p == '_')
            };
            // consume the whole number
            while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                i += 1;
            }
            if i + 1 < bytes.len()
                && bytes[i] as char == '.'
                && (bytes[i + 1] as char).is_ascii_digit()
            {
                i += 1;
                while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                    i += 1;
                }
            }
            if i < bytes.len() && bytes[i] as char == '%' {
                i += 1;
            }
            if boundary {
                count += 1;
            }
        } else {
            i += 1;
        }
    }
    count
}

/// Collect distinct 4-digit years in 1900–2099, sorted ascending.
pub fn years_cited(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut years = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if (bytes[i] as char).is_ascii_digit() {
            let start = i;
            while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                i += 1;
            }
            let run = &text[start..i];
            let bounded_left = start == 0 || {
                let p = bytes[start - 1] as char;
                !(p.is_ascii_alphanumeric() || p == '_')
            };
            let bounded_right = i >= bytes.len() || {
                let n = bytes[i] as char;
                !(n.is_ascii_alphanumeric() || n == '_')
            };
            if run.len() == 4
                && bounded_left
                && bounded_right
                && (run.starts_with("19") || run.starts_with("20"))
            {
                let year = run.to_string();
                if !years.contains(&year) {
                    years.push(year);
                }
            }
        } else {
            i += 1;
        }
    }
    years.sort();
    years
}

/// Count contractions: an apostrophe with a word character on both sides.
pub fn count_contractions(text: &str) -> usize {
    let chars: Vec<char> = text.chars().collect();
    let mut count = 0;
    for i in 1..chars.len().saturating_sub(1) {
        if (chars[i] == '\'' || chars[i] == '\u{2019}')
            && chars[i - 1].is_alphanumeric()
            && chars[i + 1].is_alphanumeric()
        {
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_extracts_word_character_runs() {
        assert_eq!(words("Hello, world! It's fine."), vec![
            "Hello", "world", "It", "s", "fine"
        ]);
        assert_eq!(words(""), Vec::<&str>::new());
    }

    #[test]
    fn sentences_split_on_terminator_runs() {
        assert_eq!(sentences("One. Two!! Three?"), vec!["One", "Two", "Three"]);
        assert_eq!(sentences("No terminator"), vec!["No terminator"]);
    }

    #[test]
    fn numeric_facts_respect_word_boundaries() {
        assert_eq!(count_numeric_facts("3 cats, 4.5% rise, abc123"), 2);
        assert_eq!(count_numeric_facts("no numbers here"), 0);
    }

    #[test]
    fn years_filters_range_and_dedupes() {
        assert_eq!(years_cited("In 2024 and 2024 and 1899 and 2150"), vec!["2024"]);
        assert_eq!(years_cited("From 1999 to 2025"), vec!["1999", "2025"]);
    }

    #[test]
    fn contractions_counted_with_word_neighbors() {
        assert_eq!(count_contractions("don't can't 'quote'"), 2);
    }

    #[test]
    fn stats_basics() {
        assert_eq!(mean(&[2.0, 4.0]), 3.0);
        assert!((std_dev(&[2.0, 4.0]) - 1.0).abs() < 1e-9);
        assert_eq!(coefficient_of_variation(&[]), 0.0);
    }
}
