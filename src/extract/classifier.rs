//! Token heuristics for provider URLs and server labels.
//!
//! Matching is a plain case-insensitive substring test.

use crate::config::ExtractionConfig;

/// Classifies URLs and element text against fixed token lists.
#[derive(Debug, Clone)]
pub struct ProviderClassifier {
    provider_tokens: Vec<String>,
    label_tokens: Vec<String>,
    max_label_length: usize,
}

impl ProviderClassifier {
    /// Build a classifier. Tokens are lower-cased; empty tokens are dropped so
    /// they cannot match everything.
    pub fn new(provider_tokens: &[String], label_tokens: &[String], max_label_length: usize) -> Self {
        Self {
            provider_tokens: normalize_tokens(provider_tokens),
            label_tokens: normalize_tokens(label_tokens),
            max_label_length,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(
            &config.provider_tokens,
            &config.label_tokens,
            config.max_label_length,
        )
    }

    /// True if any provider token occurs anywhere in the URL.
    pub fn looks_like_provider(&self, url: &str) -> bool {
        if url.is_empty() {
            return false;
        }
        let low = url.to_lowercase();
        self.provider_tokens.iter().any(|tok| low.contains(tok.as_str()))
    }

    /// True if element text is short enough to be a label and names a provider.
    pub fn is_server_label(&self, text: &str) -> bool {
        let text = text.trim();
        let len = text.chars().count();
        if len == 0 || len >= self.max_label_length {
            return false;
        }
        let low = text.to_lowercase();
        self.label_tokens.iter().any(|tok| low.contains(tok.as_str()))
    }

    pub fn max_label_length(&self) -> usize {
        self.max_label_length
    }
}

impl Default for ProviderClassifier {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }
}

fn normalize_tokens(tokens: &[String]) -> Vec<String> {
    let mut out: Vec<String> = tokens
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}
