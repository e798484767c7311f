//! Configuration for platform clients.
//!
//! Loaded from TOML or JSON (by file extension), then overlaid with
//! environment variables:
//! - `<PLATFORM>_API_KEY`, `<PLATFORM>_APP_TOKEN` (e.g. `STUBHUB_API_KEY`)
//! - `SCRAPE_PROXIES`: comma separated proxy URLs
//! - `REDIS_URL`: shared rate-limit store (requires `redis-backend`)

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::Platform;
use crate::rate_limit::{
    default_rules, DelayRange, RateLimitRule, config::DEFAULT_MAX_DELAY_SECS,
    config::DEFAULT_MIN_DELAY_SECS,
};
use crate::scrapers::detect::DetectionRules;
use crate::scrapers::http_client::HttpClientOptions;
use crate::scrapers::proxy::{parse_proxy_list, ProxyStrategy};

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "ticketscout.toml";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_min_delay() -> f64 {
    DEFAULT_MIN_DELAY_SECS
}

fn default_max_delay() -> f64 {
    DEFAULT_MAX_DELAY_SECS
}

/// Scraping fallback settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapingConfig {
    /// Allow HTML scraping when the API path is unavailable.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Minimum seconds between requests from one client.
    #[serde(default = "default_min_delay")]
    pub min_delay: f64,
    /// Maximum seconds between requests from one client.
    #[serde(default = "default_max_delay")]
    pub max_delay: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proxies: Vec<String>,
    #[serde(default)]
    pub proxy_strategy: ProxyStrategy,
    /// Fixed user agent. Rotates through real browser agents when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_delay: DEFAULT_MIN_DELAY_SECS,
            max_delay: DEFAULT_MAX_DELAY_SECS,
            proxies: Vec::new(),
            proxy_strategy: ProxyStrategy::default(),
            user_agent: None,
        }
    }
}

impl ScrapingConfig {
    pub fn delay_range(&self) -> DelayRange {
        DelayRange::new(self.min_delay, self.max_delay)
    }
}

/// A platform's `scraping` table as written. Unset fields inherit
/// `[defaults]`.
#[derive(Debug, Clone, Default, Deserialize)]
struct ScrapingOverrides {
    enabled: Option<bool>,
    min_delay: Option<f64>,
    max_delay: Option<f64>,
    proxies: Option<Vec<String>>,
    proxy_strategy: Option<ProxyStrategy>,
    user_agent: Option<String>,
}

impl ScrapingOverrides {
    fn merged_over(self, defaults: &ScrapingConfig) -> ScrapingConfig {
        ScrapingConfig {
            enabled: self.enabled.unwrap_or(defaults.enabled),
            min_delay: self.min_delay.unwrap_or(defaults.min_delay),
            max_delay: self.max_delay.unwrap_or(defaults.max_delay),
            proxies: self.proxies.unwrap_or_else(|| defaults.proxies.clone()),
            proxy_strategy: self.proxy_strategy.unwrap_or(defaults.proxy_strategy),
            user_agent: self.user_agent.or_else(|| defaults.user_agent.clone()),
        }
    }
}

/// Per-platform settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_token: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Point API calls at the platform's sandbox host.
    #[serde(default)]
    pub sandbox: bool,
    /// Override the public site URL (mirrors, testing).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Override the API base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    /// Effective scraping settings. Read from files through
    /// [`PlatformEntry`] so unset fields inherit `[defaults]`.
    #[serde(skip_deserializing)]
    pub scraping: ScrapingConfig,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            app_token: None,
            timeout: DEFAULT_TIMEOUT_SECS,
            sandbox: false,
            base_url: None,
            api_base_url: None,
            scraping: ScrapingConfig::default(),
        }
    }
}

impl PlatformConfig {
    /// Both API credentials present and non-blank.
    pub fn has_api_credentials(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.api_key) && present(&self.app_token)
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// HTTP client options for this platform.
    pub fn http_options(&self, extra_headers: HashMap<String, String>) -> HttpClientOptions {
        HttpClientOptions {
            timeout: self.timeout_duration(),
            delay: self.scraping.delay_range(),
            proxies: self.scraping.proxies.clone(),
            proxy_strategy: self.scraping.proxy_strategy,
            user_agent: self.scraping.user_agent.clone(),
            extra_headers,
        }
    }
}

/// One `[platforms.<name>]` table as written.
#[derive(Deserialize)]
struct PlatformEntry {
    #[serde(flatten)]
    settings: PlatformConfig,
    #[serde(default)]
    scraping: ScrapingOverrides,
}

/// Config file shape before platform tables are merged over `[defaults]`.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    platforms: HashMap<String, PlatformEntry>,
    #[serde(default)]
    defaults: ScrapingConfig,
    #[serde(default)]
    rate_limits: HashMap<String, RateLimitRule>,
    #[serde(default)]
    detection: DetectionRules,
    #[serde(default)]
    redis_url: Option<String>,
}

impl From<RawConfig> for Config {
    fn from(raw: RawConfig) -> Self {
        let platforms = raw
            .platforms
            .into_iter()
            .map(|(name, entry)| {
                let mut settings = entry.settings;
                settings.scraping = entry.scraping.merged_over(&raw.defaults);
                (name, settings)
            })
            .collect();

        Self {
            platforms,
            defaults: raw.defaults,
            rate_limits: raw.rate_limits,
            detection: raw.detection,
            redis_url: raw.redis_url,
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "RawConfig")]
pub struct Config {
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub platforms: HashMap<String, PlatformConfig>,
    /// Scraping settings inherited by every platform.
    pub defaults: ScrapingConfig,
    /// Rate limit overrides, merged over the built-in table.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub rate_limits: HashMap<String, RateLimitRule>,
    pub detection: DetectionRules,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,
}

impl Config {
    /// Load from `path`, or `ticketscout.toml` in the working directory, or
    /// defaults. Environment overrides are applied in every case.
    pub async fn load(path: Option<&Path>) -> Result<Self, String> {
        let config = match path {
            Some(path) => Self::load_from_path(path).await?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::load_from_path(Path::new(DEFAULT_CONFIG_FILE)).await?
            }
            None => Self::default(),
        };
        Ok(config.with_env_overrides())
    }

    /// Load config from a specific file path (TOML or JSON by extension).
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

        let config: Config = match ext {
            "json" => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
            _ => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
        };

        debug!(path = %path.display(), platforms = config.platforms.len(), "Loaded config");
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        for platform in Platform::ALL {
            let prefix = platform.as_str().to_uppercase();
            let api_key = non_empty(&format!("{}_API_KEY", prefix));
            let app_token = non_empty(&format!("{}_APP_TOKEN", prefix));
            if api_key.is_none() && app_token.is_none() {
                continue;
            }

            let mut entry = self.platform(platform);
            if api_key.is_some() {
                entry.api_key = api_key;
            }
            if app_token.is_some() {
                entry.app_token = app_token;
            }
            self.platforms.insert(platform.as_str().to_string(), entry);
        }

        if let Some(raw) = non_empty("SCRAPE_PROXIES") {
            let proxies = parse_proxy_list(&raw);
            self.defaults.proxies = proxies.clone();
            for entry in self.platforms.values_mut() {
                if entry.scraping.proxies.is_empty() {
                    entry.scraping.proxies = proxies.clone();
                }
            }
        }

        if let Some(url) = non_empty("REDIS_URL") {
            self.redis_url = Some(url);
        }

        self
    }

    /// Effective settings for `platform`.
    pub fn platform(&self, platform: Platform) -> PlatformConfig {
        self.platforms
            .get(platform.as_str())
            .cloned()
            .unwrap_or_else(|| PlatformConfig {
                scraping: self.defaults.clone(),
                ..PlatformConfig::default()
            })
    }

    /// Built-in rate limit rules with configured overrides applied.
    pub fn rate_rules(&self) -> HashMap<String, RateLimitRule> {
        let mut rules = default_rules();
        rules.extend(self.rate_limits.clone());
        rules
    }
}
