//! HTTP client for marketplace scraping.
//!
//! Every call passes through the platform rate governor and the per-instance
//! delay governor before any bytes leave the process, so governance state
//! advances exactly once per call whether or not the request succeeds.

mod detection;
mod response;

pub use detection::{classify_error_status, detect_anti_bot, parse_retry_after, DEFAULT_RETRY_AFTER};
pub use response::HttpResponse;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::cookie::Jar;
use reqwest::Client;
use tracing::{debug, info, warn};

use super::headers::{build_anti_detection_headers, to_header_map};
use super::proxy::{ProxyRotation, ProxyStrategy};
use crate::error::{Result, ScrapeError};
use crate::models::{Platform, RequestMethod, ScrapeRequest};
use crate::rate_limit::{DelayGovernor, DelayRange, RateGovernor};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Construction options for [`ScrapingHttpClient`].
#[derive(Debug, Clone)]
pub struct HttpClientOptions {
    pub timeout: Duration,
    pub delay: DelayRange,
    pub proxies: Vec<String>,
    pub proxy_strategy: ProxyStrategy,
    /// Fixed user agent; `None` rotates through the browser pool.
    pub user_agent: Option<String>,
    /// Platform headers merged over the browser defaults.
    pub extra_headers: HashMap<String, String>,
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            delay: DelayRange::default(),
            proxies: Vec::new(),
            proxy_strategy: ProxyStrategy::default(),
            user_agent: None,
            extra_headers: HashMap::new(),
        }
    }
}

/// Scraping HTTP client bound to one platform.
///
/// Holds one reqwest client per configured proxy (or a single direct client),
/// all sharing one cookie jar so session cookies survive proxy rotation.
pub struct ScrapingHttpClient {
    platform: Platform,
    clients: Vec<Client>,
    rotation: ProxyRotation,
    proxies: Vec<String>,
    cookies: Arc<Jar>,
    rate: RateGovernor,
    delay: DelayGovernor,
    timeout: Duration,
    user_agent: Option<String>,
    extra_headers: HashMap<String, String>,
}

impl ScrapingHttpClient {
    pub fn new(platform: Platform, options: HttpClientOptions, rate: RateGovernor) -> Result<Self> {
        let cookies = Arc::new(Jar::default());
        let clients = build_clients(&options.proxies, options.timeout, &cookies)?;

        Ok(Self {
            platform,
            rotation: ProxyRotation::new(options.proxies.len(), options.proxy_strategy),
            clients,
            proxies: options.proxies,
            cookies,
            rate,
            delay: DelayGovernor::new(options.delay),
            timeout: options.timeout,
            user_agent: options.user_agent,
            extra_headers: options.extra_headers,
        })
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn delay_governor(&self) -> &DelayGovernor {
        &self.delay
    }

    pub fn rate_governor(&self) -> &RateGovernor {
        &self.rate
    }

    pub fn extra_headers(&self) -> &HashMap<String, String> {
        &self.extra_headers
    }

    pub fn proxies(&self) -> &[String] {
        &self.proxies
    }

    /// Change the randomized spacing between requests.
    pub fn set_delay_range(&self, min_secs: f64, max_secs: f64) {
        self.delay.set_delay_range(min_secs, max_secs);
    }

    /// Replace the proxy list. An empty list goes direct.
    pub fn set_proxy_config(&mut self, proxies: Vec<String>, strategy: ProxyStrategy) -> Result<()> {
        self.clients = build_clients(&proxies, self.timeout, &self.cookies)?;
        self.rotation = ProxyRotation::new(proxies.len(), strategy);
        self.proxies = proxies;
        Ok(())
    }

    fn pick_client(&self) -> &Client {
        let index = self.rotation.next_index().unwrap_or(0);
        if let Some(proxy) = self.proxies.get(index) {
            debug!(platform = %self.platform, proxy = %proxy, "Using proxy");
        }
        &self.clients[index.min(self.clients.len() - 1)]
    }

    async fn govern(&self) {
        self.rate.respect_rate_limit(self.platform.as_str()).await;
        self.delay.enforce_delay().await;
    }

    /// Send one request with governance and browser headers applied.
    ///
    /// Returns the response whatever its status; transport failures map to
    /// `Network` or `Timeout`.
    pub async fn execute(&self, request: &ScrapeRequest) -> Result<HttpResponse> {
        self.govern().await;

        let headers = build_anti_detection_headers(
            &self.extra_headers,
            request.referer.as_deref(),
            self.user_agent.as_deref(),
        );
        let client = self.pick_client();
        let builder = match request.method {
            RequestMethod::Get => client.get(&request.url),
            RequestMethod::Post => client
                .post(&request.url)
                .body(request.body.clone().unwrap_or_default()),
        };

        let response = builder
            .headers(to_header_map(&headers))
            .send()
            .await
            .map_err(|e| ScrapeError::from_reqwest(&request.url, e))?;

        HttpResponse::read(response)
            .await
            .map_err(|e| ScrapeError::from_reqwest(&request.url, e))
    }

    /// Fetch a page body, turning error statuses and challenge pages into errors.
    pub async fn fetch(&self, request: &ScrapeRequest) -> Result<String> {
        let start = Instant::now();
        let response = self.execute(request).await?;
        let platform = self.platform.as_str();

        if !response.is_success() {
            return Err(classify_error_status(
                platform,
                &request.url,
                response.status.as_u16(),
                &response.body,
                response.retry_after(),
            ));
        }

        if let Some(reason) = detect_anti_bot(&response.body) {
            return Err(ScrapeError::BotDetected {
                platform: platform.to_string(),
                reason: reason.to_string(),
            });
        }

        self.delay.record_success();
        info!(
            platform,
            url = %request.url,
            response_time_ms = start.elapsed().as_millis() as u64,
            content_length = response.content_length(),
            "Scraping request successful"
        );

        Ok(response.body)
    }

    /// Best-effort page fetch: the body on success, an empty string on any
    /// failure (logged with platform and URL).
    pub async fn make_scraping_request(&self, request: &ScrapeRequest) -> String {
        match self.fetch(request).await {
            Ok(body) => body,
            Err(e) => {
                if e.is_blocking() {
                    warn!(platform = %self.platform, url = %request.url, error = %e, "Scraping blocked");
                } else {
                    warn!(platform = %self.platform, url = %request.url, error = %e, "Scraping request failed");
                }
                String::new()
            }
        }
    }

    /// JSON API call. Rate limited like scraping, without browser headers.
    pub async fn api_request(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &HashMap<String, String>,
    ) -> Result<serde_json::Value> {
        self.rate.respect_rate_limit(self.platform.as_str()).await;

        let response = self.clients[0]
            .get(url)
            .query(query)
            .header("Accept", "application/json")
            .headers(to_header_map(headers))
            .send()
            .await
            .map_err(|e| ScrapeError::from_reqwest(url, e))?;

        if !response.status().is_success() {
            let response = HttpResponse::read(response)
                .await
                .map_err(|e| ScrapeError::from_reqwest(url, e))?;
            return Err(classify_error_status(
                self.platform.as_str(),
                url,
                response.status.as_u16(),
                &response.body,
                response.retry_after(),
            ));
        }

        response.json().await.map_err(|e| {
            if e.is_decode() {
                ScrapeError::Parse(format!("invalid JSON from {}: {}", url, e))
            } else {
                ScrapeError::from_reqwest(url, e)
            }
        })
    }
}

fn build_clients(proxies: &[String], timeout: Duration, cookies: &Arc<Jar>) -> Result<Vec<Client>> {
    let base = || {
        Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .cookie_provider(Arc::clone(cookies))
    };

    if proxies.is_empty() {
        let client = base()
            .build()
            .map_err(|e| ScrapeError::Config(format!("failed to build HTTP client: {}", e)))?;
        return Ok(vec![client]);
    }

    proxies
        .iter()
        .map(|proxy| {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| ScrapeError::Config(format!("invalid proxy {}: {}", proxy, e)))?;
            base()
                .proxy(proxy)
                .build()
                .map_err(|e| ScrapeError::Config(format!("failed to build HTTP client: {}", e)))
        })
        .collect()
}
