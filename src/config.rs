//! Configuration management for embedsniff using the prefer crate.
//!
//! Config files are discovered by prefer (`embedsniff.toml`, `.yaml`, `.json`, ...)
//! and parsed with serde. Every field has a default, so an absent file is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default overall navigation timeout for a request.
pub const DEFAULT_TIMEOUT_MS: u64 = 25_000;

/// Substrings that mark a URL as a likely player or media link.
pub const DEFAULT_PROVIDER_TOKENS: &[&str] = &[
    "player", "embed", "mp4upload", "vap", "yourupload", "mp4", "videas", "vk.com", "ok.ru",
    "mega", "megacdn", "mega.nz", "megavideo", "stream", "cloud", "vidmoly", "mail.ru",
    "sibnet", "openload", "dropapk", "vidstream", "gdrive", "gvideo", "gogoplay", "fastly",
    "cdn", "video", "hqq", "ok", "vk", "m3u8", ".m3u8",
];

/// Provider names that identify a "server" button or link by its text.
pub const DEFAULT_LABEL_TOKENS: &[&str] = &[
    "vk", "ok", "videa", "mp4upload", "yourupload", "megaupload", "mega", "stream", "vidmoly",
    "videas", "sibnet", "upload",
];

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserEngineConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub server: ServerConfig,

    /// Path the config was loaded from, if any.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

/// Browser launch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserEngineConfig {
    /// Run in headless mode (default: true).
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Explicit Chrome/Chromium executable. Auto-detected when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<PathBuf>,

    /// Additional Chrome arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chrome_args: Vec<String>,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,

    /// User agent override for the page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// CDP resource types aborted before they reach the network.
    #[serde(default = "default_blocked_resource_types")]
    pub blocked_resource_types: Vec<String>,
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            chrome_args: Vec::new(),
            proxy: None,
            user_agent: None,
            blocked_resource_types: default_blocked_resource_types(),
        }
    }
}

/// Navigation timing and heuristic settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// How long to wait for a caller-supplied selector after navigation.
    #[serde(default = "default_selector_timeout_ms")]
    pub selector_timeout_ms: u64,

    /// Fixed delay after navigation before the DOM is read.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Navigation counts as idle with at most this many requests in flight...
    #[serde(default = "default_idle_connections")]
    pub idle_connections: usize,

    /// ...for at least this long.
    #[serde(default = "default_idle_window_ms")]
    pub idle_window_ms: u64,

    /// Longest element text still treated as a server label.
    #[serde(default = "default_max_label_length")]
    pub max_label_length: usize,

    /// Upper bound on elements inspected for server labels.
    #[serde(default = "default_max_label_elements")]
    pub max_label_elements: usize,

    /// JSON bodies larger than this are not scanned.
    #[serde(default = "default_max_json_body_bytes")]
    pub max_json_body_bytes: usize,

    #[serde(default = "default_provider_tokens")]
    pub provider_tokens: Vec<String>,

    #[serde(default = "default_label_tokens")]
    pub label_tokens: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            selector_timeout_ms: default_selector_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            idle_connections: default_idle_connections(),
            idle_window_ms: default_idle_window_ms(),
            max_label_length: default_max_label_length(),
            max_label_elements: default_max_label_elements(),
            max_json_body_bytes: default_max_json_body_bytes(),
            provider_tokens: default_provider_tokens(),
            label_tokens: default_label_tokens(),
        }
    }
}

impl ExtractionConfig {
    pub fn selector_timeout(&self) -> Duration {
        Duration::from_millis(self.selector_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn idle_window(&self) -> Duration {
        Duration::from_millis(self.idle_window_ms)
    }
}

/// Redirect resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Per-candidate probe timeout.
    #[serde(default = "default_resolve_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Candidates resolved at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Wall-clock bound on the whole resolution phase.
    #[serde(default = "default_budget_ms")]
    pub budget_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_resolve_timeout_ms(),
            max_redirects: default_max_redirects(),
            concurrency: default_concurrency(),
            budget_ms: default_budget_ms(),
        }
    }
}

impl ResolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }
}

/// HTTP service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit_bytes(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_blocked_resource_types() -> Vec<String> {
    ["image", "font", "stylesheet"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_selector_timeout_ms() -> u64 {
    5_000
}

fn default_settle_delay_ms() -> u64 {
    700
}

fn default_idle_connections() -> usize {
    2
}

fn default_idle_window_ms() -> u64 {
    500
}

fn default_max_label_length() -> usize {
    30
}

fn default_max_label_elements() -> usize {
    2_000
}

fn default_max_json_body_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_provider_tokens() -> Vec<String> {
    DEFAULT_PROVIDER_TOKENS.iter().map(|s| s.to_string()).collect()
}

fn default_label_tokens() -> Vec<String> {
    DEFAULT_LABEL_TOKENS.iter().map(|s| s.to_string()).collect()
}

fn default_resolve_timeout_ms() -> u64 {
    10_000
}

fn default_max_redirects() -> usize {
    10
}

fn default_concurrency() -> usize {
    4
}

fn default_budget_ms() -> u64 {
    30_000
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_body_limit_bytes() -> usize {
    5 * 1024 * 1024
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    pub async fn load() -> Self {
        let config = match prefer::load("embedsniff").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("{}; using defaults", e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            // No config file found
            Err(_) => Self::default(),
        };
        config.with_env_overrides()
    }

    /// Load from an explicit path, or fall back to discovery.
    pub async fn load_with(path: Option<&Path>) -> Result<Self, String> {
        match path {
            Some(path) => Ok(Self::load_from_path(path).await?.with_env_overrides()),
            None => Ok(Self::load().await),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML, and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply `PORT`, `EMBEDSNIFF_CHROME`, and `EMBEDSNIFF_HEADLESS`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(port) = std::env::var("PORT")
            .ok()
            .and_then(|p| p.trim().parse::<u16>().ok())
        {
            self.server.port = port;
        }

        if let Some(chrome) = std::env::var("EMBEDSNIFF_CHROME")
            .ok()
            .filter(|s| !s.is_empty())
        {
            self.browser.chrome_path = Some(PathBuf::from(chrome));
        }

        if let Ok(headless) = std::env::var("EMBEDSNIFF_HEADLESS") {
            match headless.to_lowercase().as_str() {
                "0" | "false" | "no" => self.browser.headless = false,
                "1" | "true" | "yes" => self.browser.headless = true,
                _ => {}
            }
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.browser.headless);
        assert_eq!(
            config.browser.blocked_resource_types,
            vec!["image", "font", "stylesheet"]
        );
        assert_eq!(config.extraction.default_timeout_ms, 25_000);
        assert_eq!(config.extraction.selector_timeout_ms, 5_000);
        assert_eq!(config.extraction.settle_delay_ms, 700);
        assert_eq!(config.resolver.timeout_ms, 10_000);
        assert!(config.resolver.timeout_ms < config.extraction.default_timeout_ms);
        assert_eq!(config.server.port, 3001);
        assert!(config.extraction.provider_tokens.iter().any(|t| t == ".m3u8"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [extraction]
            settle_delay_ms = 1500

            [server]
            port = 8080
            "#,
        )
        .unwrap();

        assert_eq!(config.extraction.settle_delay_ms, 1500);
        assert_eq!(config.extraction.selector_timeout_ms, 5_000);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(config.browser.headless);
    }

    #[test]
    fn test_yaml_token_override() {
        let config: Config = serde_yaml::from_str(
            r#"
            extraction:
              provider_tokens: ["filemoon", "dood"]
            "#,
        )
        .unwrap();
        assert_eq!(config.extraction.provider_tokens, vec!["filemoon", "dood"]);
        assert_eq!(config.extraction.label_tokens.len(), DEFAULT_LABEL_TOKENS.len());
    }

    #[tokio::test]
    async fn test_load_from_path_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embedsniff.json");
        tokio::fs::write(&path, r#"{"resolver": {"concurrency": 1}}"#)
            .await
            .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.resolver.concurrency, 1);
        assert_eq!(config.source_path.as_deref(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn test_load_from_path_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embedsniff.toml");
        tokio::fs::write(&path, "[server\nport = 1").await.unwrap();

        let err = Config::load_from_path(&path).await.unwrap_err();
        assert!(err.contains("TOML"));
    }
}
