//! Abort requests for resource types the extractor never needs.

use std::sync::Arc;

use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
    RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::Result;

/// Pauses every request and fails the blocked types; everything else continues.
pub struct RequestBlocker {
    task: JoinHandle<()>,
}

impl RequestBlocker {
    /// Subscribe to paused requests, then enable interception. With an empty
    /// block list nothing is intercepted at all.
    pub async fn arm(page: &Page, blocked_types: &[String]) -> Result<Option<Self>> {
        if blocked_types.is_empty() {
            return Ok(None);
        }

        let blocked: Arc<Vec<String>> = Arc::new(blocked_types.to_vec());
        let mut paused = page.event_listener::<EventRequestPaused>().await?;

        let task = {
            let page = page.clone();
            tokio::spawn(async move {
                while let Some(event) = paused.next().await {
                    let outcome = if is_blocked(&event.resource_type, &blocked) {
                        trace!("Blocked {:?}: {}", event.resource_type, event.request.url);
                        page.execute(FailRequestParams::new(
                            event.request_id.clone(),
                            ErrorReason::BlockedByClient,
                        ))
                        .await
                        .map(|_| ())
                    } else {
                        page.execute(ContinueRequestParams::new(event.request_id.clone()))
                            .await
                            .map(|_| ())
                    };
                    if let Err(e) = outcome {
                        debug!("Could not answer paused request: {}", e);
                    }
                }
            })
        };

        let enable = EnableParams::builder()
            .pattern(
                RequestPattern::builder()
                    .url_pattern("*")
                    .request_stage(RequestStage::Request)
                    .build(),
            )
            .build();
        page.execute(enable).await?;

        debug!("Request interception armed for {:?}", blocked_types);
        Ok(Some(Self { task }))
    }
}

impl Drop for RequestBlocker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Case-insensitive match of a CDP resource type against the block list.
fn is_blocked(resource_type: &ResourceType, blocked: &[String]) -> bool {
    let name = resource_type.as_ref();
    blocked.iter().any(|b| b.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_resource_types() {
        let blocked = vec!["image".to_string(), "font".to_string(), "stylesheet".to_string()];
        assert!(is_blocked(&ResourceType::Image, &blocked));
        assert!(is_blocked(&ResourceType::Font, &blocked));
        assert!(is_blocked(&ResourceType::Stylesheet, &blocked));
        assert!(!is_blocked(&ResourceType::Document, &blocked));
        assert!(!is_blocked(&ResourceType::Script, &blocked));
        assert!(!is_blocked(&ResourceType::Xhr, &blocked));
        assert!(!is_blocked(&ResourceType::Media, &blocked));
    }
}
