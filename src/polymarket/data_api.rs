// Lightweight Polymarket Data API client.
// Plain HTTP + serde; the public endpoints need no auth.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header::RETRY_AFTER, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use super::types::{Activity, Position};

pub const DATA_API_BASE: &str = "https://data-api.polymarket.com";

// ─────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DataApiConfig {
    pub base_url: String,
    /// Per-request timeout. Default: 10s.
    pub timeout: Duration,
    /// Retries after a 429 / 5xx / transport failure. Default: 3.
    pub max_retries: u32,
    /// Linear backoff step: retry n waits `backoff_base * n`. Default: 500ms.
    pub backoff_base: Duration,
    /// Upper bound for any single wait, including `Retry-After`. Default: 10s.
    pub backoff_max: Duration,
    /// Page size for `/activity`. Default: 100.
    pub activity_limit: u32,
    /// Page size for `/positions`. Default: 500.
    pub positions_limit: u32,
    /// `sizeThreshold` for `/positions`; dust below this is skipped. Default: 0.01.
    pub size_threshold: f64,
}

impl Default for DataApiConfig {
    fn default() -> Self {
        Self {
            base_url: DATA_API_BASE.to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(10),
            activity_limit: 100,
            positions_limit: 500,
            size_threshold: 0.01,
        }
    }
}

impl DataApiConfig {
    /// Load overrides from environment variables (if set).
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("PM_DATA_API_BASE") {
            if !v.trim().is_empty() {
                cfg.base_url = v.trim().to_string();
            }
        }
        if let Ok(v) = std::env::var("PM_HTTP_TIMEOUT_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                cfg.timeout = Duration::from_millis(ms);
            }
        }
        if let Ok(v) = std::env::var("PM_MAX_RETRIES") {
            if let Ok(n) = v.parse::<u32>() {
                cfg.max_retries = n;
            }
        }
        if let Ok(v) = std::env::var("PM_BACKOFF_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                cfg.backoff_base = Duration::from_millis(ms);
            }
        }
        if let Ok(v) = std::env::var("PM_BACKOFF_MAX_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                cfg.backoff_max = Duration::from_millis(ms);
            }
        }
        if let Ok(v) = std::env::var("PM_ACTIVITY_LIMIT") {
            if let Ok(n) = v.parse::<u32>() {
                cfg.activity_limit = n;
            }
        }
        if let Ok(v) = std::env::var("PM_POSITIONS_LIMIT") {
            if let Ok(n) = v.parse::<u32>() {
                cfg.positions_limit = n;
            }
        }
        if let Ok(v) = std::env::var("PM_SIZE_THRESHOLD") {
            if let Ok(f) = v.parse::<f64>() {
                cfg.size_threshold = f;
            }
        }
        cfg
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(attempt.max(1))
            .min(self.backoff_max)
    }
}

// ─────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DataApiClient {
    client: reqwest::Client,
    cfg: DataApiConfig,
}

impl DataApiClient {
    pub fn new(cfg: DataApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .user_agent(concat!("pm_rooms/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, cfg })
    }

    pub fn config(&self) -> &DataApiConfig {
        &self.cfg
    }

    /// Most recent activity for a wallet, newest first.
    pub async fn activity(&self, user: &str) -> Result<Vec<Activity>> {
        let url = self.endpoint(
            "activity",
            &[
                ("user", user.to_string()),
                ("limit", self.cfg.activity_limit.to_string()),
                ("offset", "0".to_string()),
                ("sortBy", "TIMESTAMP".to_string()),
                ("sortDirection", "DESC".to_string()),
            ],
        )?;
        self.get_json(url)
            .await
            .with_context(|| format!("Failed to fetch activity for {}", user))
    }

    /// Open positions for a wallet.
    pub async fn positions(&self, user: &str) -> Result<Vec<Position>> {
        let url = self.endpoint(
            "positions",
            &[
                ("user", user.to_string()),
                ("limit", self.cfg.positions_limit.to_string()),
                ("offset", "0".to_string()),
                ("sizeThreshold", self.cfg.size_threshold.to_string()),
            ],
        )?;
        self.get_json(url)
            .await
            .with_context(|| format!("Failed to fetch positions for {}", user))
    }

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let raw = format!("{}/{}", self.cfg.base_url.trim_end_matches('/'), path);
        let mut url = Url::parse(&raw).with_context(|| format!("Invalid Data API URL: {}", raw))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// GET with linear backoff on 429 / 5xx / timeouts.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let mut attempt: u32 = 0;
        loop {
            let outcome = self.client.get(url.clone()).send().await;
            let delay = match outcome {
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .json::<T>()
                        .await
                        .context("Failed to parse Data API response");
                }
                Ok(resp) if is_retryable(resp.status()) => {
                    let status = resp.status();
                    if attempt >= self.cfg.max_retries {
                        anyhow::bail!(
                            "Data API still returning {} after {} retries",
                            status,
                            attempt
                        );
                    }
                    attempt += 1;
                    let delay = retry_after(&resp)
                        .map(|d| d.min(self.cfg.backoff_max))
                        .unwrap_or_else(|| self.cfg.backoff_delay(attempt));
                    warn!(
                        "⏳ Data API {} on {} -> retry {}/{} in {:?}",
                        status,
                        url.path(),
                        attempt,
                        self.cfg.max_retries,
                        delay
                    );
                    delay
                }
                Ok(resp) => {
                    anyhow::bail!("Data API returned status: {}", resp.status());
                }
                Err(err) if err.is_timeout() || err.is_connect() => {
                    if attempt >= self.cfg.max_retries {
                        return Err(err).context("Data API unreachable");
                    }
                    attempt += 1;
                    let delay = self.cfg.backoff_delay(attempt);
                    warn!(
                        "⏳ Data API transport error on {}: {} -> retry {}/{} in {:?}",
                        url.path(),
                        err,
                        attempt,
                        self.cfg.max_retries,
                        delay
                    );
                    delay
                }
                Err(err) => return Err(err).context("Failed to request Data API"),
            };
            sleep(delay).await;
            debug!("retrying {}", url);
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn retry_after(resp: &Response) -> Option<Duration> {
    if resp.status() != StatusCode::TOO_MANY_REQUESTS {
        return None;
    }
    resp.headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
