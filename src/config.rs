use std::env;
use std::net::SocketAddr;

use anyhow::Context;

use crate::polymarket::data_api::DataApiConfig;
use crate::tracker::TrackerConfig;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    pub data_api: DataApiConfig,
    pub tracker: TrackerConfig,
    pub max_addresses_per_room: usize,
    /// When set, logs also go to a daily-rotated file in this directory.
    pub log_dir: Option<String>,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        let raw_bind = env::var("PM_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.into());
        let bind_addr = raw_bind
            .parse::<SocketAddr>()
            .with_context(|| format!("PM_BIND_ADDR is not a socket address: {}", raw_bind))?;

        Ok(Self {
            bind_addr,
            data_api: DataApiConfig::from_env(),
            tracker: TrackerConfig::from_env(),
            max_addresses_per_room: env::var("PM_MAX_ADDRESSES_PER_ROOM")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(50),
            log_dir: env::var("PM_LOG_DIR").ok().filter(|v| !v.trim().is_empty()),
        })
    }
}
