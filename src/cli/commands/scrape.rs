//! Single extraction command.

use anyhow::Context;
use console::style;

use embedsniff::{Config, EmbedExtractor};

use crate::cli::icons::{error, success};

/// Run one extraction and print the result to stdout.
pub async fn cmd_scrape(
    config: Config,
    url: &str,
    wait_for: Option<String>,
    timeout: Option<u64>,
    pretty: bool,
) -> anyhow::Result<()> {
    let extractor = EmbedExtractor::new(config).context("Failed to create extractor")?;
    let request = extractor.request(url, wait_for, timeout)?;

    let result = match extractor.extract(&request).await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("{} {}", error(), e);
            return Err(e.into());
        }
    };

    let json = if pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{}", json);

    eprintln!(
        "{} {} embed(s), {} server label(s) from {}",
        success(),
        style(result.embeds.len()).bold(),
        result.servers.len(),
        result.requested_url
    );

    Ok(())
}
