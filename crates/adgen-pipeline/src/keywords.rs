//! Local keyword fallback used when the extraction service is unavailable.

use std::collections::HashSet;

/// Upper bound on fallback keywords, matching the extractor's 5-8 target.
pub const MAX_LOCAL_KEYWORDS: usize = 8;

const STOP_WORDS: &[&str] = &[
    "about", "after", "again", "all", "also", "and", "any", "are", "because", "been", "before",
    "being", "best", "both", "but", "can", "come", "could", "day", "did", "does", "each", "every",
    "for", "from", "get", "got", "had", "has", "have", "her", "here", "him", "his", "how", "into",
    "its", "just", "let", "like", "make", "more", "most", "much", "now", "off", "one", "only",
    "our", "ours", "out", "over", "own", "same", "see", "she", "should", "some", "such", "than",
    "that", "the", "their", "them", "then", "there", "these", "they", "this", "those", "through",
    "today", "too", "try", "under", "until", "very", "visit", "was", "way", "well", "were",
    "what", "when", "where", "which", "while", "who", "why", "will", "with", "would", "yet", "you",
    "your", "yours",
];

/// Deterministic keywords from the script text.
///
/// Words are lowercased, stop words and words shorter than three letters
/// are dropped, and the first [`MAX_LOCAL_KEYWORDS`] distinct words are
/// kept in order of appearance.
pub fn local_keywords(text: &str) -> Vec<String> {
    let stop: HashSet<&str> = STOP_WORDS.iter().copied().collect();
    let mut seen = HashSet::new();

    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|w| w.trim_matches('\'').to_lowercase())
        .filter(|w| w.chars().count() >= 3)
        .filter(|w| w.chars().any(char::is_alphabetic))
        .filter(|w| !stop.contains(w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .take(MAX_LOCAL_KEYWORDS)
        .collect()
}
