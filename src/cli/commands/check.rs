//! Classifier probe command.

use console::style;

use embedsniff::extract::ProviderClassifier;
use embedsniff::Config;

use crate::cli::icons::{error, success};

/// Print whether each URL passes the provider classifier.
pub fn cmd_check(config: &Config, urls: &[String]) -> anyhow::Result<()> {
    let classifier = ProviderClassifier::from_config(&config.extraction);

    let mut matched = 0;
    for url in urls {
        if classifier.looks_like_provider(url) {
            matched += 1;
            println!("{} {}", success(), url);
        } else {
            println!("{} {}", error(), style(url).dim());
        }
    }

    eprintln!("{}/{} look like provider links", matched, urls.len());
    Ok(())
}
