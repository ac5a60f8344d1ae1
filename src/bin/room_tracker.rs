//! pm_rooms — Room Tracker HTTP service
//!
//!   client ──HTTP──→ axum Router ──→ RoomStore (rooms / addresses / feed)
//!                               └──→ Tracker ──TTL cache──→ Polymarket Data API
//!
//! Configuration comes from the environment (`.env` honoured).

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pm_rooms::api;
use pm_rooms::config::Settings;
use pm_rooms::AppState;

/// Stdout logging, plus a daily rolling file when `log_dir` is set.
/// The returned guard must live until shutdown so buffered lines flush.
fn init_logging(log_dir: Option<&str>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer());

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "room_tracker.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let settings = Settings::from_env()?;
    let _log_guard = init_logging(settings.log_dir.as_deref());

    info!("═══════════════════════════════════════════════════");
    info!("  pm_rooms — Room Tracker");
    info!("═══════════════════════════════════════════════════");
    info!(
        "📊 Config: bind={} api={} ttl={:?} retries={} backoff={:?} max_addrs={}",
        settings.bind_addr,
        settings.data_api.base_url,
        settings.tracker.cache_ttl,
        settings.data_api.max_retries,
        settings.data_api.backoff_base,
        settings.max_addresses_per_room,
    );

    let state = AppState::from_settings(&settings)?;
    api::serve(state, settings.bind_addr).await?;

    info!("👋 Room Tracker stopped");
    Ok(())
}
