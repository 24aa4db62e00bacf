//! Headless Chrome sessions driven over CDP with chromiumoxide.
//!
//! One [`BrowserSession`] owns one browser process. It is created per
//! extraction and torn down afterwards, so nothing leaks between requests.

mod intercept;
mod navigate;

pub use intercept::RequestBlocker;
pub use navigate::{navigate, settle, wait_for_selector};

use std::path::{Path, PathBuf};
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BrowserEngineConfig;
use crate::error::{Result, ScrapeError};

/// Common Chrome executable paths to check.
const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    // Common install locations
    "/opt/google/chrome/google-chrome",
];

/// Executable names looked up on `PATH`.
const CHROME_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

/// Flags every launch gets. The sandbox flags let Chrome start inside
/// containers without extra privileges. With site isolation off, cross-origin
/// iframes share the page's target, so their traffic reaches its listeners.
const LAUNCH_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-features=IsolateOrigins,site-per-process,TranslateUI",
    "--disable-site-isolation-trials",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-networking",
    "--disable-sync",
    "--mute-audio",
];

/// Find a Chrome executable: explicit path, then well-known locations, then `PATH`.
pub fn find_chrome(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            debug!("Using configured Chrome at: {}", path.display());
            return Ok(path.to_path_buf());
        }
        return Err(ScrapeError::BrowserNotFound(format!(
            "configured path {} does not exist",
            path.display()
        )));
    }

    for path in CHROME_PATHS {
        let p = Path::new(path);
        if p.exists() {
            debug!("Found Chrome at: {}", path);
            return Ok(p.to_path_buf());
        }
    }

    for cmd in CHROME_COMMANDS {
        if let Ok(path) = which::which(cmd) {
            debug!("Found Chrome in PATH: {}", path.display());
            return Ok(path);
        }
    }

    Err(ScrapeError::BrowserNotFound(
        "install Chrome or Chromium, or set EMBEDSNIFF_CHROME:\n\
         - Arch/Manjaro: sudo pacman -S chromium\n\
         - Ubuntu/Debian: sudo apt install chromium-browser\n\
         - Fedora: sudo dnf install chromium"
            .to_string(),
    ))
}

/// chromiumoxide's own default for a single CDP command.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Slack on top of the request timeout so our own deadline fires first.
const COMMAND_TIMEOUT_MARGIN: Duration = Duration::from_secs(5);

/// CDP command timeout for a session serving a request with `request_timeout`.
fn command_timeout(request_timeout: Duration) -> Duration {
    (request_timeout + COMMAND_TIMEOUT_MARGIN).max(DEFAULT_COMMAND_TIMEOUT)
}

/// Every argument passed to Chrome for this configuration.
fn launch_args(config: &BrowserEngineConfig) -> Vec<String> {
    let mut args: Vec<String> = LAUNCH_ARGS.iter().map(|a| a.to_string()).collect();
    if let Some(ref proxy) = config.proxy {
        args.push(format!("--proxy-server={}", proxy));
    }
    args.extend(config.chrome_args.iter().cloned());
    args
}

/// A running browser plus the task pumping its CDP connection.
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    user_agent: Option<String>,
}

impl BrowserSession {
    /// Launch a fresh browser process for one request.
    pub async fn launch(config: &BrowserEngineConfig, request_timeout: Duration) -> Result<Self> {
        let chrome_path = find_chrome(config.chrome_path.as_deref())?;
        info!("Launching browser (headless={})", config.headless);

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .request_timeout(command_timeout(request_timeout));

        // with_head means NOT headless
        if !config.headless {
            builder = builder.with_head();
        }

        for arg in launch_args(config) {
            builder = builder.arg(arg);
        }

        let browser_config = builder
            .build()
            .map_err(|e| ScrapeError::Launch(format!("invalid browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScrapeError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser,
            handler,
            user_agent: config.user_agent.clone(),
        })
    }

    /// Open a blank page, applying the user agent override if configured.
    pub async fn open_page(&self) -> Result<Page> {
        let page = self.browser.new_page("about:blank").await?;

        if let Some(ref user_agent) = self.user_agent {
            page.execute(SetUserAgentOverrideParams::new(user_agent.clone()))
                .await?;
        }

        Ok(page)
    }

    /// Close the browser and wait for the process to exit.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            debug!("Browser process wait failed: {}", e);
        }
        self.handler.abort();
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_args_include_sandbox_flags_and_extras() {
        let config = BrowserEngineConfig {
            proxy: Some("socks5://127.0.0.1:1080".into()),
            chrome_args: vec!["--lang=en-US".into()],
            ..Default::default()
        };
        let args = launch_args(&config);
        assert!(args.iter().any(|a| a == "--no-sandbox"));
        assert!(args.iter().any(|a| a == "--disable-setuid-sandbox"));
        assert!(args.iter().any(|a| a == "--proxy-server=socks5://127.0.0.1:1080"));
        assert_eq!(args.last().map(String::as_str), Some("--lang=en-US"));
    }

    #[test]
    fn test_site_isolation_disabled() {
        let args = launch_args(&BrowserEngineConfig::default());
        assert!(args
            .iter()
            .any(|a| a.starts_with("--disable-features=") && a.contains("site-per-process")));
        assert!(args.iter().any(|a| a == "--disable-site-isolation-trials"));
    }

    #[test]
    fn test_command_timeout_outlasts_request() {
        assert_eq!(command_timeout(Duration::from_secs(5)), DEFAULT_COMMAND_TIMEOUT);
        assert_eq!(command_timeout(Duration::from_secs(60)), Duration::from_secs(65));
        assert!(command_timeout(Duration::from_secs(25)) > Duration::from_secs(25));
    }

    #[test]
    fn test_missing_explicit_chrome_is_reported() {
        let err = find_chrome(Some(Path::new("/definitely/not/here/chrome"))).unwrap_err();
        assert!(matches!(err, ScrapeError::BrowserNotFound(_)));
        assert!(err.to_string().contains("/definitely/not/here/chrome"));
    }
}
