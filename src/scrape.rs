//! One extraction, end to end.
//!
//! [`EmbedExtractor::extract`] walks a single browser session through its
//! states, collects DOM and network candidates, tears the session down, and
//! only then resolves candidates into the final result.

use std::fmt;
use std::sync::Arc;

use chromiumoxide::Page;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::browser::{self, BrowserSession, RequestBlocker};
use crate::config::Config;
use crate::error::{Result, ScrapeError};
use crate::extract::{
    assemble, DomExtractor, HttpResolver, NetworkObserver, ProviderClassifier, ResolveFinal,
    ResolveLimits,
};
use crate::models::{Candidate, ScrapeRequest, ScrapeResult, ServerLabel};

/// Lifecycle of one browser session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Launched,
    PageOpen,
    InterceptionArmed,
    Navigating,
    Settled,
    Failed,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "created",
            SessionState::Launched => "launched",
            SessionState::PageOpen => "page_open",
            SessionState::InterceptionArmed => "interception_armed",
            SessionState::Navigating => "navigating",
            SessionState::Settled => "settled",
            SessionState::Failed => "failed",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        self == SessionState::Closed
    }
}

/// Tracks and logs state transitions for one request.
#[derive(Debug)]
pub struct Lifecycle {
    url: String,
    state: SessionState,
}

impl Lifecycle {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            state: SessionState::Created,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Move to `next`. Nothing leaves `Closed`.
    pub fn advance(&mut self, next: SessionState) {
        if self.state.is_terminal() {
            return;
        }
        debug!("Session {} -> {} ({})", self.state, next, self.url);
        self.state = next;
    }

    /// Record a failure. `Closed` still follows once teardown runs.
    pub fn fail(&mut self, err: &ScrapeError) {
        if self.state.is_terminal() {
            return;
        }
        warn!("Session failed in state {} for {}: {}", self.state, self.url, err);
        self.state = SessionState::Failed;
    }
}

/// What a session collected before teardown.
struct Collected {
    servers: Vec<ServerLabel>,
    dom: Vec<Candidate>,
    network: Vec<String>,
}

/// Runs extractions. Cheap to share; every call gets its own browser.
pub struct EmbedExtractor {
    config: Arc<Config>,
    classifier: Arc<ProviderClassifier>,
    resolver: Arc<dyn ResolveFinal>,
}

impl EmbedExtractor {
    pub fn new(config: Config) -> Result<Self> {
        let resolver = HttpResolver::new(&config.resolver, config.browser.user_agent.as_deref())?;
        Ok(Self::with_resolver(config, Arc::new(resolver)))
    }

    /// Use a custom resolver in place of the HTTP one.
    pub fn with_resolver(config: Config, resolver: Arc<dyn ResolveFinal>) -> Self {
        let classifier = Arc::new(ProviderClassifier::from_config(&config.extraction));
        Self {
            config: Arc::new(config),
            classifier,
            resolver,
        }
    }

    /// Validate raw input, filling in the configured default timeout.
    pub fn request(
        &self,
        url: &str,
        wait_selector: Option<String>,
        timeout_ms: Option<u64>,
    ) -> Result<ScrapeRequest> {
        let timeout_ms = timeout_ms.unwrap_or(self.config.extraction.default_timeout_ms);
        ScrapeRequest::new(url, wait_selector, timeout_ms)
    }

    /// Render the page, collect candidates, and resolve them.
    ///
    /// The browser is always torn down before this returns, and before any
    /// candidate is resolved. Navigation and resolution share one deadline,
    /// `request.timeout` from now.
    pub async fn extract(&self, request: &ScrapeRequest) -> Result<ScrapeResult> {
        let mut lifecycle = Lifecycle::new(request.target_url.as_str());
        let deadline = Instant::now() + request.timeout;

        let session = match BrowserSession::launch(&self.config.browser, request.timeout).await {
            Ok(session) => session,
            Err(e) => {
                lifecycle.fail(&e);
                lifecycle.advance(SessionState::Closed);
                return Err(e);
            }
        };
        lifecycle.advance(SessionState::Launched);

        let collected = self
            .extract_inner(&session, request, deadline, &mut lifecycle)
            .await;
        if let Err(ref e) = collected {
            lifecycle.fail(e);
        }
        session.close().await;
        lifecycle.advance(SessionState::Closed);

        let collected = collected?;
        info!(
            "Collected {} frame(s), {} network URL(s) from {}",
            collected.dom.len(),
            collected.network.len(),
            request.target_url
        );

        let limits = ResolveLimits::for_request(&self.config.resolver, request.timeout, deadline);
        Ok(assemble(
            request,
            collected.servers,
            collected.dom,
            collected.network,
            self.resolver.as_ref(),
            limits,
        )
        .await)
    }

    /// Session logic with a live browser. Browser cleanup handled by caller.
    async fn extract_inner(
        &self,
        session: &BrowserSession,
        request: &ScrapeRequest,
        deadline: Instant,
        lifecycle: &mut Lifecycle,
    ) -> Result<Collected> {
        let page = session.open_page().await?;
        lifecycle.advance(SessionState::PageOpen);

        // Use inner function to ensure page is always closed
        let result = self.collect(&page, request, deadline, lifecycle).await;
        let _ = page.close().await;
        result
    }

    /// Page logic - page cleanup handled by caller.
    async fn collect(
        &self,
        page: &Page,
        request: &ScrapeRequest,
        deadline: Instant,
        lifecycle: &mut Lifecycle,
    ) -> Result<Collected> {
        let extraction = &self.config.extraction;
        let url = request.target_url.as_str();

        // Listeners go in before interception so no early request is missed.
        let observer = NetworkObserver::attach(
            page,
            Arc::clone(&self.classifier),
            extraction.idle_connections,
            extraction.max_json_body_bytes,
        )
        .await?;
        let _blocker = RequestBlocker::arm(page, &self.config.browser.blocked_resource_types).await?;
        lifecycle.advance(SessionState::InterceptionArmed);

        lifecycle.advance(SessionState::Navigating);
        browser::navigate(
            page,
            url,
            &observer,
            extraction.idle_window(),
            deadline,
            request.timeout,
        )
        .await?;

        if let Some(ref selector) = request.wait_selector {
            browser::wait_for_selector(page, selector, extraction.selector_timeout()).await;
        }

        browser::settle(extraction.settle_delay()).await;
        lifecycle.advance(SessionState::Settled);

        let dom = DomExtractor::new(&self.classifier, extraction.max_label_elements);
        let frames = dom.frames(page).await;
        let servers = dom.labels(page).await;
        let network = observer.finish().await;

        Ok(Collected {
            servers,
            dom: frames,
            network,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_failure_still_closes() {
        let mut lifecycle = Lifecycle::new("https://site.example/ep/1");
        lifecycle.advance(SessionState::Launched);
        lifecycle.advance(SessionState::PageOpen);
        lifecycle.fail(&ScrapeError::NavigationTimeout {
            url: "https://site.example/ep/1".into(),
            timeout_ms: 100,
        });
        assert_eq!(lifecycle.state(), SessionState::Failed);

        lifecycle.advance(SessionState::Closed);
        assert_eq!(lifecycle.state(), SessionState::Closed);

        // Closed is terminal.
        lifecycle.advance(SessionState::Navigating);
        assert_eq!(lifecycle.state(), SessionState::Closed);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(SessionState::InterceptionArmed.to_string(), "interception_armed");
        assert_eq!(SessionState::PageOpen.to_string(), "page_open");
    }

    #[test]
    fn test_request_uses_default_timeout() {
        let extractor = EmbedExtractor::new(Config::default()).unwrap();
        let request = extractor
            .request("https://site.example/ep/1", None, None)
            .unwrap();
        assert_eq!(request.timeout.as_millis(), 25_000);

        let request = extractor
            .request("https://site.example/ep/1", Some("#player".into()), Some(4000))
            .unwrap();
        assert_eq!(request.timeout.as_millis(), 4_000);
        assert_eq!(request.wait_selector.as_deref(), Some("#player"));
    }

    #[test]
    fn test_request_rejects_missing_url() {
        let extractor = EmbedExtractor::new(Config::default()).unwrap();
        let err = extractor.request("", None, None).unwrap_err();
        assert!(err.is_client_error());
    }
}
