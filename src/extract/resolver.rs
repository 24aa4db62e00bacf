//! Candidate normalisation and redirect resolution.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, Method, StatusCode};
use tracing::debug;
use url::Url;

use crate::config::ResolverConfig;

/// Default user agent for resolution probes.
pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Follows redirects for a candidate URL.
///
/// Implementations never fail: when the destination cannot be determined the
/// input is returned unchanged. `timeout` bounds each network probe.
#[async_trait]
pub trait ResolveFinal: Send + Sync {
    async fn resolve_final(&self, candidate: &str, timeout: Duration) -> String;
}

/// Resolver that probes with HEAD and falls back to GET.
#[derive(Clone)]
pub struct HttpResolver {
    client: Client,
}

impl HttpResolver {
    pub fn new(config: &ResolverConfig, user_agent: Option<&str>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent.unwrap_or(USER_AGENT))
            .timeout(config.timeout())
            .redirect(Policy::limited(config.max_redirects))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { client })
    }

    /// Send one probe and return the post-redirect URL with its status.
    /// The body is never read.
    async fn probe(
        &self,
        method: Method,
        url: &str,
        timeout: Duration,
    ) -> Result<(String, StatusCode), reqwest::Error> {
        let response = self.client.request(method, url).timeout(timeout).send().await?;
        Ok((response.url().to_string(), response.status()))
    }
}

#[async_trait]
impl ResolveFinal for HttpResolver {
    async fn resolve_final(&self, candidate: &str, timeout: Duration) -> String {
        match self.probe(Method::HEAD, candidate, timeout).await {
            Ok((final_url, status)) if !is_method_rejection(status) => return final_url,
            Ok((_, status)) => debug!("HEAD rejected with {} for {}, retrying with GET", status, candidate),
            Err(e) => debug!("HEAD failed for {}: {}, retrying with GET", candidate, e),
        }

        match self.probe(Method::GET, candidate, timeout).await {
            Ok((final_url, _)) => final_url,
            Err(e) => {
                debug!("GET failed for {}: {}, keeping original", candidate, e);
                candidate.to_string()
            }
        }
    }
}

fn is_method_rejection(status: StatusCode) -> bool {
    status == StatusCode::METHOD_NOT_ALLOWED || status == StatusCode::NOT_IMPLEMENTED
}

/// Turn a raw candidate into an absolute http(s) URL.
///
/// Protocol-relative URLs get `https:`; anything else not starting with
/// `http` is joined onto the page URL. Returns `None` for empty input,
/// `data:` URLs, failed joins, and non-network schemes such as `about:`
/// or `javascript:`.
pub fn normalize_candidate(raw: &str, page_url: &Url) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("data:")) {
        return None;
    }

    let absolute = if let Some(rest) = raw.strip_prefix("//") {
        Url::parse(&format!("https://{}", rest)).ok()?
    } else if raw.starts_with("http") {
        Url::parse(raw).ok()?
    } else {
        page_url.join(raw).ok()?
    };

    match absolute.scheme() {
        "http" | "https" => Some(absolute.to_string()),
        _ => None,
    }
}
