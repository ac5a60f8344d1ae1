// One-shot report for a single wallet: grouped recent activity + positions.
// Usage: address_report <0x address> [window_secs]
//        (or set PM_REPORT_ADDRESS)

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pm_rooms::polymarket::aggregate::{
    aggregate_positions, group_activities, merge_activities, summarize, PositionSort,
};
use pm_rooms::polymarket::data_api::{DataApiClient, DataApiConfig};
use pm_rooms::rooms::model::normalize_address;

const DEFAULT_WINDOW_SECS: i64 = 3600;

fn parse_window(raw: Option<String>) -> anyhow::Result<i64> {
    let window = match raw {
        Some(w) => w.trim().parse::<i64>().context("window_secs must be an integer")?,
        None => DEFAULT_WINDOW_SECS,
    };
    anyhow::ensure!(window > 0, "window_secs must be a positive number of seconds");
    Ok(window)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let raw = args
        .next()
        .or_else(|| std::env::var("PM_REPORT_ADDRESS").ok())
        .context("Usage: address_report <0x address> [window_secs]")?;
    let window = parse_window(args.next())?;

    let (address, checksum) = normalize_address(&raw)?;
    let client = DataApiClient::new(DataApiConfig::from_env())?;

    info!("🔍 Fetching Data API records for {}", checksum);
    let (activity, positions) = tokio::join!(client.activity(&address), client.positions(&address));
    let activity = merge_activities([activity?]);
    let positions = positions?;

    let summary = summarize(&[(address.clone(), None)], &activity, &positions);
    info!(
        "📦 value=${:.2} cost=${:.2} pnl=${:.2} ({:.1}%) markets={} trades={} volume=${:.2}",
        summary.position_value,
        summary.cost_basis,
        summary.cash_pnl,
        summary.percent_pnl,
        summary.open_markets,
        summary.trade_count,
        summary.volume_usdc,
    );

    info!("── Positions ──");
    for p in aggregate_positions(&positions, PositionSort::Value).iter().take(20) {
        info!(
            "   {:<50} {:<6} size={:>10.2} avg={:.3} cur={:.3} value=${:>9.2} pnl=${:>8.2}",
            p.title.as_deref().unwrap_or(&p.condition_id),
            p.outcome.as_deref().unwrap_or("?"),
            p.total_size,
            p.avg_price,
            p.cur_price,
            p.current_value,
            p.cash_pnl,
        );
    }

    info!("── Activity (grouped, window={}s) ──", window);
    for g in group_activities(&activity, Some(window)).iter().take(20) {
        info!(
            "   {} {:<10} {:<4} {:<50} x{} size={:.2} avg={:.3} usdc=${:.2}",
            g.last_timestamp,
            g.kind.as_str(),
            g.side.map(|s| s.as_str()).unwrap_or("-"),
            g.title.as_deref().unwrap_or(&g.condition_id),
            g.count,
            g.total_size,
            g.avg_price,
            g.total_usdc,
        );
    }

    Ok(())
}
