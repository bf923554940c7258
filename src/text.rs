use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;

static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-z][a-z'\-]*[a-z]|[a-z]").expect("valid word regex"));

const STOP_WORDS: &[&str] = &[
    "about", "above", "after", "again", "all", "also", "and", "any", "are", "because", "been",
    "before", "being", "between", "both", "but", "can", "could", "did", "does", "doing", "down",
    "during", "each", "few", "for", "from", "further", "had", "has", "have", "having", "her",
    "here", "hers", "him", "his", "how", "into", "its", "itself", "just", "more", "most", "not",
    "off", "once", "only", "other", "our", "ours", "out", "over", "own", "same", "she",
    "should", "some", "such", "than", "that", "the", "their", "theirs", "them", "then", "there",
    "these", "they", "this", "those", "through", "too", "under", "until", "very", "was", "were",
    "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with", "would",
    "you", "your", "yours", "yourself", "we", "us", "who's", "it's", "don't", "can't",
];

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Lowercase words of at least `min_len` characters, stop words removed.
pub fn tokenize(text: &str, min_len: usize) -> Vec<String> {
    let lower = text.to_lowercase();
    WORD_RE
        .find_iter(&lower)
        .map(|m| m.as_str().trim_matches(|c| c == '\'' || c == '-'))
        .filter(|word| word.chars().count() >= min_len && !is_stop_word(word))
        .map(str::to_string)
        .collect()
}

/// Words ranked by frequency, ties alphabetical.
pub fn ranked_keywords(text: &str, limit: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for word in tokenize(text, 3) {
        *counts.entry(word).or_insert(0) += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(limit);
    ranked
}

pub fn keyword_set(text: &str) -> BTreeSet<String> {
    tokenize(text, 3).into_iter().collect()
}

/// Splits form input on commas, semicolons and newlines.
pub fn split_list(input: &str) -> Vec<String> {
    input
        .split([',', ';', '\n'])
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
