//! HTTP surface for the extractor.
//!
//! - `POST /scrape` runs one extraction and returns the result as JSON
//! - `GET /health` answers as long as the process is up

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Config;
use crate::scrape::EmbedExtractor;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<EmbedExtractor>,
    pub body_limit_bytes: usize,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let body_limit_bytes = config.server.body_limit_bytes;
        Ok(Self {
            extractor: Arc::new(EmbedExtractor::new(config)?),
            body_limit_bytes,
        })
    }
}

/// Start the web server.
pub async fn serve(config: Config, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(config)?;
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
