//! Passive network observation for the lifetime of one page.
//!
//! Subscribes to request/response events, keeps every classified URL in an
//! insertion-ordered set, scans JSON bodies for URL-shaped strings, and tracks
//! in-flight requests so navigation can wait for the network to go quiet.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent, EventResponseReceived,
    GetResponseBodyParams, RequestId,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use regex::Regex;
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::classifier::ProviderClassifier;

/// Matches absolute URLs embedded in JSON text.
static JSON_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"'}]+"#).expect("valid URL regex"));

/// How long a single response body read may take.
const BODY_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval while waiting for network idle.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Deduplicating URL set that remembers discovery order.
#[derive(Debug, Default)]
pub struct CandidateSet {
    seen: HashSet<String>,
    order: Vec<String>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a URL. Empty strings and repeats are ignored.
    pub fn insert(&mut self, url: &str) -> bool {
        if url.is_empty() || self.seen.contains(url) {
            return false;
        }
        self.seen.insert(url.to_string());
        self.order.push(url.to_string());
        true
    }

    pub fn into_vec(self) -> Vec<String> {
        self.order
    }
}

/// Whether a declared content type is JSON-like.
pub fn is_json_content_type(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("json")
}

/// Pull every URL-shaped substring out of a JSON body that also passes the
/// classifier. Escaped slashes (`https:\/\/...`) are unescaped first.
pub fn scan_json_body(body: &str, classifier: &ProviderClassifier) -> Vec<String> {
    let unescaped;
    let text = if body.contains("\\/") {
        unescaped = body.replace("\\/", "/");
        unescaped.as_str()
    } else {
        body
    };

    JSON_URL_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|u| classifier.looks_like_provider(u))
        .map(|u| u.to_string())
        .collect()
}

/// In-flight request bookkeeping for the network-idle heuristic.
#[derive(Debug)]
struct IdleState {
    inflight: HashSet<RequestId>,
    max_inflight: usize,
    /// When the in-flight count last dropped to `max_inflight` or below.
    idle_since: Option<Instant>,
}

impl IdleState {
    fn new(max_inflight: usize) -> Self {
        Self {
            inflight: HashSet::new(),
            max_inflight,
            idle_since: Some(Instant::now()),
        }
    }

    fn started(&mut self, id: RequestId) {
        self.inflight.insert(id);
        self.refresh();
    }

    fn ended(&mut self, id: &RequestId) {
        self.inflight.remove(id);
        self.refresh();
    }

    fn refresh(&mut self) {
        if self.inflight.len() > self.max_inflight {
            self.idle_since = None;
        } else if self.idle_since.is_none() {
            self.idle_since = Some(Instant::now());
        }
    }

    fn idle_for(&self, window: Duration) -> bool {
        self.idle_since.is_some_and(|since| since.elapsed() >= window)
    }
}

/// Listener task plus the state it accumulates.
///
/// The task is aborted when the observer is finished or dropped, so no event
/// is processed after the session ends. JSON bodies are read on their own
/// tasks so a slow read never holds up idle tracking.
pub struct NetworkObserver {
    candidates: Arc<Mutex<CandidateSet>>,
    idle: Arc<Mutex<IdleState>>,
    body_reads: Arc<Mutex<JoinSet<()>>>,
    task: JoinHandle<()>,
}

impl NetworkObserver {
    /// Subscribe to the page's network events. Must be called before
    /// navigation starts.
    pub async fn attach(
        page: &Page,
        classifier: Arc<ProviderClassifier>,
        max_inflight: usize,
        max_json_body_bytes: usize,
    ) -> Result<Self, CdpError> {
        let mut requests = page.event_listener::<EventRequestWillBeSent>().await?;
        let mut responses = page.event_listener::<EventResponseReceived>().await?;
        let mut finished = page.event_listener::<EventLoadingFinished>().await?;
        let mut failed = page.event_listener::<EventLoadingFailed>().await?;

        let candidates = Arc::new(Mutex::new(CandidateSet::new()));
        let idle = Arc::new(Mutex::new(IdleState::new(max_inflight)));
        let body_reads = Arc::new(Mutex::new(JoinSet::new()));

        let task = {
            let candidates = Arc::clone(&candidates);
            let idle = Arc::clone(&idle);
            let body_reads = Arc::clone(&body_reads);
            let page = page.clone();

            tokio::spawn(async move {
                // Request ids whose response declared a JSON content type.
                let mut json_requests: HashSet<RequestId> = HashSet::new();

                loop {
                    tokio::select! {
                        // Responses must be seen before their loading-finished event.
                        biased;

                        Some(event) = requests.next() => {
                            idle.lock().await.started(event.request_id.clone());
                            let url = &event.request.url;
                            if classifier.looks_like_provider(url) && candidates.lock().await.insert(url) {
                                debug!("Network candidate (request): {}", url);
                            }
                        }
                        Some(event) = responses.next() => {
                            let url = &event.response.url;
                            if classifier.looks_like_provider(url) && candidates.lock().await.insert(url) {
                                debug!("Network candidate (response): {}", url);
                            }
                            if is_json_content_type(&event.response.mime_type) {
                                json_requests.insert(event.request_id.clone());
                            }
                        }
                        Some(event) = finished.next() => {
                            idle.lock().await.ended(&event.request_id);
                            if json_requests.remove(&event.request_id) {
                                let page = page.clone();
                                let classifier = Arc::clone(&classifier);
                                let candidates = Arc::clone(&candidates);
                                let request_id = event.request_id.clone();
                                body_reads.lock().await.spawn(async move {
                                    let found = read_json_candidates(
                                        &page,
                                        &request_id,
                                        &classifier,
                                        max_json_body_bytes,
                                    )
                                    .await;
                                    let mut set = candidates.lock().await;
                                    for url in found {
                                        if set.insert(&url) {
                                            debug!("Network candidate (json body): {}", url);
                                        }
                                    }
                                });
                            }
                        }
                        Some(event) = failed.next() => {
                            idle.lock().await.ended(&event.request_id);
                            json_requests.remove(&event.request_id);
                        }
                        else => break,
                    }
                }
            })
        };

        Ok(Self {
            candidates,
            idle,
            body_reads,
            task,
        })
    }

    /// Wait until at most `max_inflight` requests have been active for
    /// `window`. Returns false if `deadline` passes first.
    pub async fn wait_for_idle(&self, window: Duration, deadline: Instant) -> bool {
        loop {
            if self.idle.lock().await.idle_for(window) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
        }
    }

    /// Detach and return the collected URLs in discovery order. Body reads
    /// already started are allowed to complete; each is bounded on its own.
    pub async fn finish(self) -> Vec<String> {
        self.task.abort();
        let mut reads = std::mem::take(&mut *self.body_reads.lock().await);
        while let Some(joined) = reads.join_next().await {
            if let Err(e) = joined {
                debug!("JSON body read did not complete: {}", e);
            }
        }
        let mut set = self.candidates.lock().await;
        std::mem::take(&mut *set).into_vec()
    }
}

impl Drop for NetworkObserver {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Read a finished response body and scan it. Every failure is swallowed.
async fn read_json_candidates(
    page: &Page,
    request_id: &RequestId,
    classifier: &ProviderClassifier,
    max_bytes: usize,
) -> Vec<String> {
    let read = tokio::time::timeout(
        BODY_READ_TIMEOUT,
        page.execute(GetResponseBodyParams::new(request_id.clone())),
    )
    .await;

    let body = match read {
        Ok(Ok(response)) => response.result,
        Ok(Err(e)) => {
            debug!("Could not read JSON response body: {}", e);
            return Vec::new();
        }
        Err(_) => {
            warn!("Timeout reading JSON response body");
            return Vec::new();
        }
    };

    if body.base64_encoded {
        debug!("Skipping base64-encoded JSON body");
        return Vec::new();
    }
    if body.body.len() > max_bytes {
        debug!("Skipping JSON body of {} bytes", body.body.len());
        return Vec::new();
    }

    scan_json_body(&body.body, classifier)
}
