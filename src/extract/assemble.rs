//! Merge DOM and network candidates, resolve them, and build the result.

use std::collections::HashSet;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;

use super::resolver::{normalize_candidate, ResolveFinal};
use crate::config::ResolverConfig;
use crate::models::{Candidate, ResolvedEmbed, ScrapeRequest, ScrapeResult, ServerLabel};

/// DOM candidates first, then network URLs in discovery order. A URL already
/// found in the DOM is not repeated from the network.
pub fn merge_candidates(dom: Vec<Candidate>, network: Vec<String>) -> Vec<Candidate> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::with_capacity(dom.len() + network.len());

    let network = network.into_iter().map(Candidate::network);
    for candidate in dom.into_iter().chain(network) {
        if candidate.raw_url.is_empty() || !seen.insert(candidate.raw_url.clone()) {
            continue;
        }
        merged.push(candidate);
    }

    merged
}

/// Normalise each candidate against the page URL and drop those that cannot
/// be made absolute. Two candidates normalising to the same URL keep the
/// first.
fn normalize_all(candidates: Vec<Candidate>, page_url: &Url) -> Vec<(Candidate, String)> {
    let mut seen: HashSet<String> = HashSet::new();
    candidates
        .into_iter()
        .filter_map(|candidate| {
            let Some(absolute) = normalize_candidate(&candidate.raw_url, page_url) else {
                debug!("Skipping candidate {}", candidate.raw_url);
                return None;
            };
            seen.insert(absolute.clone()).then_some((candidate, absolute))
        })
        .collect()
}

/// How far resolution may go for one request.
#[derive(Debug, Clone, Copy)]
pub struct ResolveLimits {
    /// Candidates resolved at once.
    pub concurrency: usize,
    /// Bound on each probe. HEAD plus the GET fallback stay within the
    /// request timeout.
    pub per_probe: Duration,
    /// No candidate is resolved past this instant.
    pub deadline: Instant,
}

impl ResolveLimits {
    /// Limits for a request with `request_timeout`, whose overall deadline is
    /// `request_deadline`. The phase ends at the earlier of the configured
    /// budget and the request deadline.
    pub fn for_request(
        config: &ResolverConfig,
        request_timeout: Duration,
        request_deadline: Instant,
    ) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            per_probe: config.timeout().min(request_timeout / 2),
            deadline: (Instant::now() + config.budget()).min(request_deadline),
        }
    }
}

/// Resolve candidates with bounded concurrency, keeping input order.
///
/// Once the deadline passes, any candidate still unresolved keeps its
/// absolute URL as the final URL.
pub async fn resolve_candidates(
    candidates: Vec<Candidate>,
    page_url: &Url,
    resolver: &dyn ResolveFinal,
    limits: ResolveLimits,
) -> Vec<ResolvedEmbed> {
    let normalized = normalize_all(candidates, page_url);

    stream::iter(normalized)
        .map(|(candidate, absolute)| async move {
            let resolve = resolver.resolve_final(&absolute, limits.per_probe);
            let final_url = match tokio::time::timeout_at(limits.deadline, resolve).await {
                Ok(final_url) => final_url,
                Err(_) => {
                    debug!("Resolution deadline passed before {}", absolute);
                    absolute.clone()
                }
            };
            ResolvedEmbed {
                source_method: candidate.source_method,
                source_url: absolute,
                final_url,
                title: candidate.title,
            }
        })
        .buffered(limits.concurrency.max(1))
        .collect()
        .await
}

/// Produce the final result from everything the session collected.
pub async fn assemble(
    request: &ScrapeRequest,
    servers: Vec<ServerLabel>,
    dom: Vec<Candidate>,
    network: Vec<String>,
    resolver: &dyn ResolveFinal,
    limits: ResolveLimits,
) -> ScrapeResult {
    let candidates = merge_candidates(dom, network);
    let embeds = resolve_candidates(candidates, &request.target_url, resolver, limits).await;

    info!(
        "Extracted {} embed(s) and {} server label(s) from {}",
        embeds.len(),
        servers.len(),
        request.requested_url
    );

    ScrapeResult {
        requested_url: request.requested_url.clone(),
        servers,
        embeds,
    }
}
