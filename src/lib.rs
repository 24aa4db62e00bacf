//! embedsniff - recover dynamically loaded video embed links from web pages.
//!
//! Renders a page in headless Chrome, watches its network traffic, reads the
//! settled DOM, and returns every likely player or media URL together with
//! where it finally redirects.

pub mod browser;
pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod scrape;
pub mod server;

pub use config::Config;
pub use error::{Result, ScrapeError};
pub use models::{Candidate, ResolvedEmbed, ScrapeRequest, ScrapeResult, ServerLabel, SourceMethod};
pub use scrape::EmbedExtractor;
