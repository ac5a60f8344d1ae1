//! Cache-through fan-out over a room's tracked addresses.
//!
//! Architecture:
//!   Room addresses ──buffered fan-out──→ TtlCache hit? ──no──→ DataApiClient
//!                                                   └──yes──→ cached Arc<Vec<_>>
//!   → label with room nicknames → merged batch + list of failed addresses

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::{stream, StreamExt};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::polymarket::aggregate::merge_activities;
use crate::polymarket::cache::TtlCache;
use crate::polymarket::data_api::DataApiClient;
use crate::polymarket::types::{Activity, Position};

// ─────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// How long a wallet's activity / positions stay cached. Default: 60s.
    pub cache_ttl: Duration,
    /// Upper bound on cached wallets per cache. Default: 2000.
    pub cache_max_entries: usize,
    /// Concurrent Data API requests per room fetch. Default: 4.
    pub fetch_concurrency: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(60),
            cache_max_entries: 2000,
            fetch_concurrency: 4,
        }
    }
}

impl TrackerConfig {
    /// Load overrides from environment variables (if set).
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("PM_CACHE_TTL_SECS") {
            if let Ok(secs) = v.parse::<u64>() {
                cfg.cache_ttl = Duration::from_secs(secs);
            }
        }
        if let Ok(v) = std::env::var("PM_CACHE_MAX_ENTRIES") {
            if let Ok(n) = v.parse::<usize>() {
                cfg.cache_max_entries = n;
            }
        }
        if let Ok(v) = std::env::var("PM_FETCH_CONCURRENCY") {
            if let Ok(n) = v.parse::<usize>() {
                cfg.fetch_concurrency = n.max(1);
            }
        }
        cfg
    }
}

/// Records gathered for several wallets, plus the wallets that failed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fetched<T> {
    pub items: Vec<T>,
    pub failed_addresses: Vec<String>,
}

// ─────────────────────────────────────────────────────────
// Tracker
// ─────────────────────────────────────────────────────────

pub struct Tracker {
    cfg: TrackerConfig,
    client: DataApiClient,
    activity_cache: Mutex<TtlCache<String, Arc<Vec<Activity>>>>,
    position_cache: Mutex<TtlCache<String, Arc<Vec<Position>>>>,
}

impl Tracker {
    pub fn new(cfg: TrackerConfig, client: DataApiClient) -> Self {
        info!(
            "📡 Tracker started | ttl={:?} max_entries={} concurrency={} api={}",
            cfg.cache_ttl,
            cfg.cache_max_entries,
            cfg.fetch_concurrency,
            client.config().base_url,
        );
        Self {
            activity_cache: Mutex::new(TtlCache::new(cfg.cache_ttl, cfg.cache_max_entries)),
            position_cache: Mutex::new(TtlCache::new(cfg.cache_ttl, cfg.cache_max_entries)),
            cfg,
            client,
        }
    }

    pub async fn address_activity(&self, address: &str) -> Result<Arc<Vec<Activity>>> {
        let key = address.to_ascii_lowercase();
        if let Some(hit) = self.activity_cache.lock().await.get(&key) {
            debug!("activity cache hit: {}", key);
            return Ok(hit);
        }
        let fresh = Arc::new(self.client.activity(&key).await?);
        self.activity_cache.lock().await.insert(key, fresh.clone());
        Ok(fresh)
    }

    pub async fn address_positions(&self, address: &str) -> Result<Arc<Vec<Position>>> {
        let key = address.to_ascii_lowercase();
        if let Some(hit) = self.position_cache.lock().await.get(&key) {
            debug!("positions cache hit: {}", key);
            return Ok(hit);
        }
        let fresh = Arc::new(self.client.positions(&key).await?);
        self.position_cache.lock().await.insert(key, fresh.clone());
        Ok(fresh)
    }

    /// Drop cached data for one address so the next read refetches.
    pub async fn refresh(&self, address: &str) {
        let key = address.to_ascii_lowercase();
        let a = self.activity_cache.lock().await.invalidate(&key);
        let p = self.position_cache.lock().await.invalidate(&key);
        debug!("cache invalidated for {} (activity={} positions={})", key, a, p);
    }

    /// Merged (deduped, newest first) activity for `(address, label)` pairs.
    pub async fn room_activity(&self, addresses: &[(String, Option<String>)]) -> Fetched<Activity> {
        let results: Vec<_> = stream::iter(addresses.iter().cloned())
            .map(|(address, label)| async move {
                let res = self.address_activity(&address).await;
                (address, label, res)
            })
            .buffered(self.cfg.fetch_concurrency.max(1))
            .collect()
            .await;

        let mut batches = Vec::with_capacity(results.len());
        let mut failed = Vec::new();
        for (address, label, res) in results {
            match res {
                Ok(items) => batches.push(
                    items
                        .iter()
                        .cloned()
                        .map(|mut a| {
                            a.label = label.clone();
                            a
                        })
                        .collect::<Vec<_>>(),
                ),
                Err(e) => {
                    warn!("⚠️ activity fetch failed for {}: {:#}", address, e);
                    failed.push(address);
                }
            }
        }
        Fetched {
            items: merge_activities(batches),
            failed_addresses: failed,
        }
    }

    /// Raw labelled positions for `(address, label)` pairs, in address order.
    pub async fn room_positions(&self, addresses: &[(String, Option<String>)]) -> Fetched<Position> {
        let results: Vec<_> = stream::iter(addresses.iter().cloned())
            .map(|(address, label)| async move {
                let res = self.address_positions(&address).await;
                (address, label, res)
            })
            .buffered(self.cfg.fetch_concurrency.max(1))
            .collect()
            .await;

        let mut items = Vec::new();
        let mut failed = Vec::new();
        for (address, label, res) in results {
            match res {
                Ok(positions) => items.extend(positions.iter().cloned().map(|mut p| {
                    p.label = label.clone();
                    p
                })),
                Err(e) => {
                    warn!("⚠️ positions fetch failed for {}: {:#}", address, e);
                    failed.push(address);
                }
            }
        }
        Fetched {
            items,
            failed_addresses: failed,
        }
    }
}
