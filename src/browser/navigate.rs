//! Navigation, selector waits, and settling.

use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::Page;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{Result, ScrapeError};
use crate::extract::NetworkObserver;

/// How often the selector is looked up while waiting for it.
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Navigate and wait until the network is idle, all before `deadline`.
///
/// Idle means at most the observer's in-flight threshold for `idle_window`.
/// Missing the deadline, in either phase, is a navigation timeout.
pub async fn navigate(
    page: &Page,
    url: &str,
    observer: &NetworkObserver,
    idle_window: Duration,
    deadline: Instant,
    timeout: Duration,
) -> Result<()> {
    info!("Navigating to {}", url);
    let nav_params = NavigateParams::builder()
        .url(url)
        .build()
        .map_err(|e| ScrapeError::InvalidRequest(format!("invalid url: {}", e)))?;

    let timed_out = || ScrapeError::NavigationTimeout {
        url: url.to_string(),
        timeout_ms: timeout.as_millis(),
    };

    let response = tokio::time::timeout_at(deadline, page.execute(nav_params))
        .await
        .map_err(|_| timed_out())?
        .map_err(|e| ScrapeError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    if let Some(reason) = response.result.error_text.clone() {
        return Err(ScrapeError::Navigation {
            url: url.to_string(),
            reason,
        });
    }

    tokio::time::timeout_at(deadline, page.wait_for_navigation())
        .await
        .map_err(|_| timed_out())?
        .map_err(|e| ScrapeError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    if !observer.wait_for_idle(idle_window, deadline).await {
        return Err(timed_out());
    }

    debug!("Network idle on {}", url);
    Ok(())
}

/// Wait up to `limit` for `selector` to appear. Never fails; a missing
/// selector is only logged.
pub async fn wait_for_selector(page: &Page, selector: &str, limit: Duration) -> bool {
    debug!("Waiting for selector: {}", selector);
    let deadline = Instant::now() + limit;

    loop {
        match tokio::time::timeout_at(deadline, page.find_element(selector)).await {
            Ok(Ok(_)) => {
                debug!("Selector found");
                return true;
            }
            Ok(Err(_)) | Err(_) => {}
        }
        if Instant::now() + SELECTOR_POLL_INTERVAL > deadline {
            warn!("Timeout waiting for selector: {}", selector);
            return false;
        }
        tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
    }
}

/// Fixed pause for late scripts before the DOM is read.
pub async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
