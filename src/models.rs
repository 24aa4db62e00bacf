//! Request, candidate, and result types shared by the extractor and its callers.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ScrapeError;

/// One extraction request. Built per call and discarded afterwards.
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    /// The URL as the caller sent it, echoed back in the result.
    pub requested_url: String,
    pub target_url: Url,
    pub wait_selector: Option<String>,
    pub timeout: Duration,
}

impl ScrapeRequest {
    /// Validate raw caller input into a request.
    ///
    /// The target must parse as an absolute http(s) URL and the timeout must be
    /// positive. A blank selector is treated as absent.
    pub fn new(
        target_url: &str,
        wait_selector: Option<String>,
        timeout_ms: u64,
    ) -> Result<Self, ScrapeError> {
        let target_url = target_url.trim();
        if target_url.is_empty() {
            return Err(ScrapeError::InvalidRequest("missing url".to_string()));
        }

        let parsed = Url::parse(target_url)
            .map_err(|e| ScrapeError::InvalidRequest(format!("invalid url '{}': {}", target_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ScrapeError::InvalidRequest(format!(
                "unsupported url scheme '{}'",
                parsed.scheme()
            )));
        }

        if timeout_ms == 0 {
            return Err(ScrapeError::InvalidRequest(
                "timeout must be greater than zero".to_string(),
            ));
        }

        let wait_selector = wait_selector
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            requested_url: target_url.to_string(),
            target_url: parsed,
            wait_selector,
            timeout: Duration::from_millis(timeout_ms),
        })
    }
}

/// Where a candidate was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMethod {
    /// Embed frame found in the rendered DOM.
    #[serde(rename = "iframe")]
    DomIframe,
    /// URL observed in request/response traffic.
    Network,
}

/// An unresolved, possibly relative URL found during a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub source_method: SourceMethod,
    pub raw_url: String,
    pub title: Option<String>,
}

impl Candidate {
    pub fn iframe(raw_url: impl Into<String>, title: Option<String>) -> Self {
        Self {
            source_method: SourceMethod::DomIframe,
            raw_url: raw_url.into(),
            title,
        }
    }

    pub fn network(raw_url: impl Into<String>) -> Self {
        Self {
            source_method: SourceMethod::Network,
            raw_url: raw_url.into(),
            title: None,
        }
    }
}

/// A UI element that names a streaming provider. Advisory only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerLabel {
    pub label: String,
    pub href: Option<String>,
}

/// A candidate after normalisation and redirect resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedEmbed {
    #[serde(rename = "method")]
    pub source_method: SourceMethod,
    pub source_url: String,
    pub final_url: String,
    pub title: Option<String>,
}

/// Complete output of one extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    pub requested_url: String,
    pub servers: Vec<ServerLabel>,
    pub embeds: Vec<ResolvedEmbed>,
}
