//! Errors surfaced to callers of the extractor.
//!
//! Only malformed input and failures to launch or navigate are reported.
//! Selector timeouts, unreadable response bodies, and unresolved candidates
//! degrade the result instead of failing it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Missing or malformed request fields. No session is started.
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Chrome/Chromium not found: {0}")]
    BrowserNotFound(String),

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation failed for {url}: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Navigation timed out after {timeout_ms}ms for {url}")]
    NavigationTimeout { url: String, timeout_ms: u128 },

    #[error("Browser protocol error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl ScrapeError {
    /// Whether the caller sent a bad request, as opposed to extraction failing.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ScrapeError::InvalidRequest(_))
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(ScrapeError::InvalidRequest("missing url".into()).is_client_error());
        assert!(!ScrapeError::Navigation {
            url: "https://example.invalid".into(),
            reason: "net::ERR_NAME_NOT_RESOLVED".into(),
        }
        .is_client_error());
        assert!(!ScrapeError::Launch("boom".into()).is_client_error());
    }

    #[test]
    fn test_timeout_message() {
        let err = ScrapeError::NavigationTimeout {
            url: "https://slow.example".into(),
            timeout_ms: 25000,
        };
        assert_eq!(
            err.to_string(),
            "Navigation timed out after 25000ms for https://slow.example"
        );
    }
}
