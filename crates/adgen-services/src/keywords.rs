//! Keyword extraction for stock-media search.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ServiceError, ServiceResult};
use crate::replicate::{output_text, ReplicateClient};

pub const KEYWORD_MAX_TOKENS: u32 = 50;

/// Longest phrase (in words) accepted as a keyword.
const MAX_KEYWORD_WORDS: usize = 4;

/// Extracts search keywords from script text.
///
/// Results have set semantics: lowercase, deduplicated, first-seen order.
#[async_trait]
pub trait KeywordExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> ServiceResult<Vec<String>>;
}

pub fn keyword_prompt(script: &str) -> String {
    format!(
        "Extract 5 - 8 specific, contextually relevant keywords from the following text for \
         searching stock media related to {script}. Ensure the keywords capture key themes, \
         actions, and objects in the script, including any relevant adjectives or descriptive \
         terms that provide context for the search."
    )
}

/// Parse a free-form model answer into a keyword list.
///
/// Accepts comma, semicolon or newline separated items, with or without
/// numbering, bullets, quotes or a leading "Keywords:" label.
pub fn parse_keyword_list(raw: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();

    for item in raw.split([',', ';', '\n']) {
        // Drop labels such as "Keywords:"
        let item = item.rsplit(':').next().unwrap_or(item);
        let item = strip_list_marker(item)
            .trim_matches(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '.' | '`'))
            .to_lowercase();

        if item.is_empty() || item.split_whitespace().count() > MAX_KEYWORD_WORDS {
            continue;
        }
        if !keywords.contains(&item) {
            keywords.push(item);
        }
    }

    keywords
}

/// Remove a leading bullet or `1.` / `2)` style number.
fn strip_list_marker(item: &str) -> &str {
    let item = item.trim().trim_start_matches(['-', '*', '\u{2022}']).trim_start();
    let digits = item.len() - item.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 {
        if let Some(rest) = item[digits..].strip_prefix(['.', ')']) {
            return rest;
        }
    }
    item
}

/// [`KeywordExtractor`] running a hosted language model.
pub struct ReplicateKeywordExtractor {
    client: Arc<ReplicateClient>,
    model: String,
}

impl ReplicateKeywordExtractor {
    pub fn new(client: Arc<ReplicateClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl KeywordExtractor for ReplicateKeywordExtractor {
    async fn extract(&self, text: &str) -> ServiceResult<Vec<String>> {
        let input = json!({
            "prompt": keyword_prompt(text),
            "max_tokens": KEYWORD_MAX_TOKENS,
        });

        let output = self.client.run(&self.model, input).await?;
        let keywords = parse_keyword_list(&output_text(&output));
        if keywords.is_empty() {
            return Err(ServiceError::empty("no keywords in model output"));
        }

        debug!(?keywords, "Keywords extracted");
        Ok(keywords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_comma_list() {
        assert_eq!(
            parse_keyword_list("Bakery, fresh bread, Pastries, bakery"),
            vec!["bakery", "fresh bread", "pastries"]
        );
    }

    #[test]
    fn test_parse_numbered_lines_with_label() {
        let raw = "Keywords:\n1. Artisanal pastries\n2) \"Warm atmosphere\"\n- coffee\n";
        assert_eq!(
            parse_keyword_list(raw),
            vec!["artisanal pastries", "warm atmosphere", "coffee"]
        );
    }

    #[test]
    fn test_parse_skips_sentences() {
        let raw = "Here are some keywords you could use for searching, bread";
        assert_eq!(parse_keyword_list(raw), vec!["bread"]);
    }

    #[test]
    fn test_leading_digits_kept_without_marker() {
        assert_eq!(parse_keyword_list("4k video, 3. sunrise"), vec!["4k video", "sunrise"]);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_keyword_list("  \n , ").is_empty());
    }

    #[test]
    fn test_prompt_mentions_script() {
        assert!(keyword_prompt("Fresh bread daily.").contains("related to Fresh bread daily."));
    }
}
