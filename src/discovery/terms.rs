//! Lightweight lexical features shared by stages 1 and 2.
use std::collections::HashMap;

const STOP_WORDS: &[&str] = &[
    "a", "about", "all", "an", "and", "any", "are", "as", "at", "be", "been", "but", "by", "can",
    "do", "does", "each", "for", "from", "has", "have", "how", "if", "in", "into", "is", "it",
    "its", "may", "more", "must", "no", "not", "of", "on", "one", "or", "other", "our", "should",
    "so", "some", "such", "that", "the", "their", "them", "then", "there", "these", "they",
    "this", "to", "use", "used", "using", "was", "we", "what", "when", "where", "which", "while",
    "who", "will", "with", "would", "you", "your", "section", "describe", "explain", "document",
    "documentation", "write", "cover", "covers", "include", "includes",
];

/// Split text into normalized terms: camelCase and snake_case pieces,
/// lowercased, stop words and single characters dropped, plurals folded.
pub fn extract_terms(text: &str) -> Vec<String> {
    let mut terms = Vec::new();
    for token in text.split(|ch: char| !ch.is_alphanumeric()) {
        for piece in split_camel_case(token) {
            let lowered = piece.to_lowercase();
            if lowered.chars().count() < 2 || lowered.chars().all(|ch| ch.is_ascii_digit()) {
                continue;
            }
            if STOP_WORDS.contains(&lowered.as_str()) {
                continue;
            }
            terms.push(fold_plural(&lowered));
        }
    }
    terms
}

/// Term frequencies for one document.
pub fn term_counts(text: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for term in extract_terms(text) {
        *counts.entry(term).or_insert(0) += 1;
    }
    counts
}

/// `parseConfigFile` -> `parse`, `Config`, `File`; runs of capitals stay together.
fn split_camel_case(token: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut prev: Option<char> = None;
    for (idx, ch) in token.char_indices() {
        if let Some(prev) = prev {
            if prev.is_lowercase() && ch.is_uppercase() {
                pieces.push(&token[start..idx]);
                start = idx;
            }
        }
        prev = Some(ch);
    }
    if start < token.len() {
        pieces.push(&token[start..]);
    }
    pieces
}

fn fold_plural(term: &str) -> String {
    if term.len() > 4 && term.ends_with("ies") {
        return format!("{}y", &term[..term.len() - 3]);
    }
    if term.len() > 3 && term.ends_with('s') && !term.ends_with("ss") && !term.ends_with("us") {
        return term[..term.len() - 1].to_string();
    }
    term.to_string()
}
