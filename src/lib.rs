pub mod api;
pub mod config;
pub mod error;
pub mod polymarket;
pub mod rooms;
pub mod tracker;

use std::sync::Arc;

use crate::config::Settings;
use crate::polymarket::data_api::DataApiClient;
use crate::rooms::RoomStore;
use crate::tracker::Tracker;

// --- Shared App State (HTTP handlers) ---
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RoomStore>,
    pub tracker: Arc<Tracker>,
}

impl AppState {
    pub fn new(store: RoomStore, tracker: Tracker) -> Self {
        Self {
            store: Arc::new(store),
            tracker: Arc::new(tracker),
        }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let client = DataApiClient::new(settings.data_api.clone())?;
        Ok(Self::new(
            RoomStore::new(settings.max_addresses_per_room),
            Tracker::new(settings.tracker.clone(), client),
        ))
    }
}
