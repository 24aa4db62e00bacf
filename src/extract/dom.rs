//! Queries against the rendered DOM: embed frames and server labels.
//!
//! The page scripts only collect raw strings. Classification and length
//! bounds are applied on this side.

use chromiumoxide::Page;
use serde::Deserialize;
use tracing::{debug, warn};

use super::classifier::ProviderClassifier;
use crate::models::{Candidate, ServerLabel};

/// Longest attribute value kept from the page.
const MAX_ATTRIBUTE_CHARS: usize = 2048;

/// Frame sources: `src`, then `data-src`, then the resolved `src` property.
const FRAMES_SCRIPT: &str = r#"
    Array.from(document.querySelectorAll('iframe')).map(f => ({
        src: f.getAttribute('src') || f.getAttribute('data-src') || f.src || '',
        title: f.getAttribute('title') || '',
        id: f.id || ''
    }))
"#;

/// One `<iframe>` as reported by the page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrameRecord {
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub id: String,
}

/// One link/button/list item/span that might name a server.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelRecord {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub server: Option<String>,
}

/// Build the label scan script with its bounds inlined.
fn labels_script(max_label_length: usize, max_elements: usize) -> String {
    format!(
        r#"
        ((maxLen, maxEls) => {{
            const out = [];
            for (const el of document.querySelectorAll('a, button, li, span')) {{
                if (out.length >= maxEls) break;
                const text = (el.textContent || '').trim();
                const server = el.dataset ? el.dataset.server : undefined;
                const short = text.length > 0 && text.length < maxLen;
                if (short || server) {{
                    out.push({{
                        text: short ? text : '',
                        href: el.getAttribute ? el.getAttribute('href') : null,
                        server: server || null
                    }});
                }}
            }}
            return out;
        }})({max_label_length}, {max_elements})
        "#
    )
}

/// Turn frame records into DOM candidates, keeping discovery order.
pub fn frame_candidates(frames: Vec<FrameRecord>) -> Vec<Candidate> {
    frames
        .into_iter()
        .filter_map(|frame| {
            let src = bound(frame.src.trim());
            if src.is_empty() {
                return None;
            }
            if !frame.id.is_empty() {
                debug!("Frame #{} -> {}", frame.id, src);
            }
            let title = Some(bound(frame.title.trim())).filter(|t| !t.is_empty());
            Some(Candidate::iframe(src, title))
        })
        .collect()
}

/// Keep records whose text names a provider, plus every `data-server` value.
pub fn server_labels(records: Vec<LabelRecord>, classifier: &ProviderClassifier) -> Vec<ServerLabel> {
    let mut labels = Vec::new();

    for record in records {
        let href = record
            .href
            .map(|h| bound(h.trim()))
            .filter(|h| !h.is_empty());

        if classifier.is_server_label(&record.text) {
            labels.push(ServerLabel {
                label: record.text.trim().to_string(),
                href: href.clone(),
            });
        }

        if let Some(server) = record.server {
            let server = bound(server.trim());
            if !server.is_empty() {
                labels.push(ServerLabel { label: server, href });
            }
        }
    }

    labels
}

fn bound(s: &str) -> String {
    s.chars().take(MAX_ATTRIBUTE_CHARS).collect()
}

/// Runs both DOM queries once the page has settled.
pub struct DomExtractor<'a> {
    classifier: &'a ProviderClassifier,
    max_label_elements: usize,
}

impl<'a> DomExtractor<'a> {
    pub fn new(classifier: &'a ProviderClassifier, max_label_elements: usize) -> Self {
        Self {
            classifier,
            max_label_elements,
        }
    }

    /// Embed frames as candidates. A failed query yields nothing.
    pub async fn frames(&self, page: &Page) -> Vec<Candidate> {
        let records: Vec<FrameRecord> = match page.evaluate(FRAMES_SCRIPT).await {
            Ok(result) => result.into_value().unwrap_or_else(|e| {
                warn!("Unexpected frame query result: {}", e);
                Vec::new()
            }),
            Err(e) => {
                warn!("Frame query failed: {}", e);
                Vec::new()
            }
        };
        debug!("Found {} frame(s)", records.len());
        frame_candidates(records)
    }

    /// Server labels. A failed query yields nothing.
    pub async fn labels(&self, page: &Page) -> Vec<ServerLabel> {
        let script = labels_script(
            self.classifier.max_label_length(),
            self.max_label_elements,
        );
        let records: Vec<LabelRecord> = match page.evaluate(script).await {
            Ok(result) => result.into_value().unwrap_or_else(|e| {
                warn!("Unexpected label query result: {}", e);
                Vec::new()
            }),
            Err(e) => {
                warn!("Label query failed: {}", e);
                Vec::new()
            }
        };
        server_labels(records, self.classifier)
    }
}
