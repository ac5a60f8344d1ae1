//! Aggregation over per-wallet Data API records.
//!
//! Everything here is a pure, single-pass transform over small in-memory
//! collections: merge + dedupe activity feeds, fold trades into groups with
//! size-weighted prices, roll positions up per outcome token across wallets,
//! and compute room-level totals.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::types::{Activity, ActivityKind, Position, TradeSide};

// ─────────────────────────────────────────────────────────
// Activity merge / filter
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ActivityKey {
    tx: String,
    wallet: String,
    asset: String,
    kind: ActivityKind,
    side: Option<TradeSide>,
    timestamp: i64,
    size_micros: i64,
}

impl ActivityKey {
    fn of(a: &Activity) -> Self {
        Self {
            tx: a.transaction_hash.to_ascii_lowercase(),
            wallet: a.proxy_wallet.to_ascii_lowercase(),
            asset: a.asset.clone(),
            kind: a.kind,
            side: a.side,
            timestamp: a.timestamp,
            size_micros: (a.size * 1e6).round() as i64,
        }
    }
}

/// Flatten per-wallet batches, drop duplicates, newest first.
///
/// The same event shows up twice when a wallet is tracked through two
/// addresses or a page is refetched; the first copy wins.
pub fn merge_activities<I>(batches: I) -> Vec<Activity>
where
    I: IntoIterator<Item = Vec<Activity>>,
{
    let mut seen = HashSet::new();
    let mut merged: Vec<Activity> = batches
        .into_iter()
        .flatten()
        .filter(|a| seen.insert(ActivityKey::of(a)))
        .collect();
    // Stable: equal timestamps keep input order.
    merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    merged
}

#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub kind: Option<ActivityKind>,
    /// Inclusive lower bound on `timestamp`.
    pub since: Option<i64>,
    pub wallet: Option<String>,
    pub offset: usize,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityPage {
    pub total: usize,
    pub offset: usize,
    pub items: Vec<Activity>,
}

pub fn filter_activities(items: Vec<Activity>, filter: &ActivityFilter) -> ActivityPage {
    let wallet = filter.wallet.as_deref().map(str::to_ascii_lowercase);
    let matching: Vec<Activity> = items
        .into_iter()
        .filter(|a| filter.kind.map_or(true, |k| a.kind == k))
        .filter(|a| filter.since.map_or(true, |s| a.timestamp >= s))
        .filter(|a| {
            wallet
                .as_deref()
                .map_or(true, |w| a.proxy_wallet.eq_ignore_ascii_case(w))
        })
        .collect();
    let total = matching.len();
    let items = matching
        .into_iter()
        .skip(filter.offset)
        .take(filter.limit.unwrap_or(usize::MAX))
        .collect();
    ActivityPage {
        total,
        offset: filter.offset,
        items,
    }
}

// ─────────────────────────────────────────────────────────
// Activity grouping
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    kind: ActivityKind,
    condition_id: String,
    wallet: String,
    outcome_index: Option<i64>,
    side: Option<TradeSide>,
}

/// Consecutive events of one kind by one wallet on one outcome.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityGroup {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub condition_id: String,
    pub proxy_wallet: String,
    pub label: Option<String>,
    pub side: Option<TradeSide>,
    pub outcome: Option<String>,
    pub outcome_index: Option<i64>,
    pub title: Option<String>,
    pub slug: Option<String>,
    pub icon: Option<String>,
    pub event_slug: Option<String>,
    pub count: usize,
    pub total_size: f64,
    pub total_usdc: f64,
    /// Size-weighted mean of member prices; 0 when total size is 0.
    pub avg_price: f64,
    pub first_timestamp: i64,
    pub last_timestamp: i64,
    pub transaction_hashes: Vec<String>,
    #[serde(skip)]
    price_weight: f64,
}

impl ActivityGroup {
    fn start(a: &Activity) -> Self {
        let mut group = Self {
            kind: a.kind,
            condition_id: a.condition_id.clone(),
            proxy_wallet: a.proxy_wallet.clone(),
            label: a.label.clone(),
            side: a.side,
            outcome: a.outcome.clone(),
            outcome_index: a.outcome_index,
            title: a.title.clone(),
            slug: a.slug.clone(),
            icon: a.icon.clone(),
            event_slug: a.event_slug.clone(),
            count: 0,
            total_size: 0.0,
            total_usdc: 0.0,
            avg_price: 0.0,
            first_timestamp: a.timestamp,
            last_timestamp: a.timestamp,
            transaction_hashes: Vec::new(),
            price_weight: 0.0,
        };
        group.absorb(a);
        group
    }

    fn absorb(&mut self, a: &Activity) {
        self.count += 1;
        self.total_size += a.size;
        self.total_usdc += a.usdc_size;
        self.price_weight += a.price * a.size;
        self.avg_price = if self.total_size.abs() > f64::EPSILON {
            self.price_weight / self.total_size
        } else {
            0.0
        };
        self.first_timestamp = self.first_timestamp.min(a.timestamp);
        self.last_timestamp = self.last_timestamp.max(a.timestamp);
        if !a.transaction_hash.is_empty() && !self.transaction_hashes.contains(&a.transaction_hash)
        {
            self.transaction_hashes.push(a.transaction_hash.clone());
        }
    }
}

/// Fold activity into groups keyed by (kind, market, wallet, outcome, side).
///
/// With `window_secs`, a key's open group is closed once the next event
/// arrives more than `window_secs` after the group's latest member, and a
/// fresh group starts. Without it, one group per key.
///
/// Sizes and USDC amounts are only ever added, so group totals sum to the
/// input totals.
pub fn group_activities(items: &[Activity], window_secs: Option<i64>) -> Vec<ActivityGroup> {
    let mut ordered: Vec<&Activity> = items.iter().collect();
    ordered.sort_by_key(|a| a.timestamp);

    let mut groups: Vec<ActivityGroup> = Vec::new();
    let mut open: HashMap<GroupKey, usize> = HashMap::new();

    for a in ordered {
        let key = GroupKey {
            kind: a.kind,
            condition_id: a.condition_id.clone(),
            wallet: a.proxy_wallet.to_ascii_lowercase(),
            outcome_index: a.outcome_index,
            side: a.side,
        };
        let joinable = open.get(&key).copied().filter(|&idx| {
            window_secs.map_or(true, |w| a.timestamp - groups[idx].last_timestamp <= w)
        });
        match joinable {
            Some(idx) => groups[idx].absorb(a),
            None => {
                open.insert(key, groups.len());
                groups.push(ActivityGroup::start(a));
            }
        }
    }

    groups.sort_by(|a, b| {
        b.last_timestamp
            .cmp(&a.last_timestamp)
            .then_with(|| b.total_usdc.total_cmp(&a.total_usdc))
    });
    groups
}

// ─────────────────────────────────────────────────────────
// Position aggregation
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionSort {
    #[default]
    Value,
    Pnl,
    Percent,
    Size,
}

impl PositionSort {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "value" | "current_value" => Some(PositionSort::Value),
            "pnl" | "cash_pnl" => Some(PositionSort::Pnl),
            "percent" | "percent_pnl" => Some(PositionSort::Percent),
            "size" => Some(PositionSort::Size),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionHolder {
    pub proxy_wallet: String,
    pub label: Option<String>,
    pub size: f64,
    pub avg_price: f64,
    pub current_value: f64,
    pub cash_pnl: f64,
}

/// One outcome token held by one or more tracked wallets.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedPosition {
    pub condition_id: String,
    pub asset: String,
    pub outcome: Option<String>,
    pub outcome_index: Option<i64>,
    pub title: Option<String>,
    pub slug: Option<String>,
    pub icon: Option<String>,
    pub event_slug: Option<String>,
    pub end_date: Option<String>,
    pub total_size: f64,
    /// Size-weighted entry price across holders.
    pub avg_price: f64,
    pub cur_price: f64,
    pub initial_value: f64,
    pub current_value: f64,
    pub cash_pnl: f64,
    pub percent_pnl: f64,
    pub realized_pnl: f64,
    pub redeemable: bool,
    pub holders: Vec<PositionHolder>,
}

impl AggregatedPosition {
    fn start(p: &Position) -> Self {
        Self {
            condition_id: p.condition_id.clone(),
            asset: p.asset.clone(),
            outcome: p.outcome.clone(),
            outcome_index: p.outcome_index,
            title: p.title.clone(),
            slug: p.slug.clone(),
            icon: p.icon.clone(),
            event_slug: p.event_slug.clone(),
            end_date: p.end_date.clone(),
            total_size: 0.0,
            avg_price: 0.0,
            cur_price: 0.0,
            initial_value: 0.0,
            current_value: 0.0,
            cash_pnl: 0.0,
            percent_pnl: 0.0,
            realized_pnl: 0.0,
            redeemable: false,
            holders: Vec::new(),
        }
    }

    fn absorb(&mut self, p: &Position) {
        let cost_weight = self.avg_price * self.total_size + p.avg_price * p.size;
        self.total_size += p.size;
        self.avg_price = if self.total_size.abs() > f64::EPSILON {
            cost_weight / self.total_size
        } else {
            0.0
        };
        if self.cur_price == 0.0 {
            self.cur_price = p.cur_price;
        }
        self.initial_value += p.initial_value;
        self.current_value += p.current_value;
        self.cash_pnl += p.cash_pnl;
        self.realized_pnl += p.realized_pnl;
        self.percent_pnl = percent_of(self.cash_pnl, self.initial_value);
        self.redeemable |= p.redeemable;
        self.holders.push(PositionHolder {
            proxy_wallet: p.proxy_wallet.clone(),
            label: p.label.clone(),
            size: p.size,
            avg_price: p.avg_price,
            current_value: p.current_value,
            cash_pnl: p.cash_pnl,
        });
    }
}

fn percent_of(pnl: f64, basis: f64) -> f64 {
    if basis.abs() > f64::EPSILON {
        pnl / basis * 100.0
    } else {
        0.0
    }
}

/// Roll positions up per outcome token across wallets.
pub fn aggregate_positions(positions: &[Position], sort: PositionSort) -> Vec<AggregatedPosition> {
    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut out: Vec<AggregatedPosition> = Vec::new();

    for p in positions {
        let token = if p.asset.is_empty() {
            format!("#{}", p.outcome_index.unwrap_or(-1))
        } else {
            p.asset.clone()
        };
        if !seen.insert((
            p.proxy_wallet.to_ascii_lowercase(),
            p.condition_id.clone(),
            token.clone(),
        )) {
            continue;
        }
        let key = (p.condition_id.clone(), token);
        let idx = *index.entry(key).or_insert_with(|| {
            out.push(AggregatedPosition::start(p));
            out.len() - 1
        });
        out[idx].absorb(p);
    }

    for agg in &mut out {
        agg.holders.sort_by(|a, b| b.size.total_cmp(&a.size));
    }
    sort_positions(&mut out, sort);
    out
}

pub fn sort_positions(items: &mut [AggregatedPosition], sort: PositionSort) {
    items.sort_by(|a, b| {
        let primary = match sort {
            PositionSort::Value => b.current_value.total_cmp(&a.current_value),
            PositionSort::Pnl => b.cash_pnl.total_cmp(&a.cash_pnl),
            PositionSort::Percent => b.percent_pnl.total_cmp(&a.percent_pnl),
            PositionSort::Size => b.total_size.total_cmp(&a.total_size),
        };
        primary.then_with(|| b.total_size.total_cmp(&a.total_size))
    });
}

// ─────────────────────────────────────────────────────────
// Summaries
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressStats {
    pub address: String,
    pub label: Option<String>,
    pub position_value: f64,
    pub cash_pnl: f64,
    pub open_positions: usize,
    pub trade_count: usize,
    pub volume_usdc: f64,
    pub last_activity_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub address_count: usize,
    pub position_value: f64,
    pub cost_basis: f64,
    pub cash_pnl: f64,
    pub percent_pnl: f64,
    pub open_markets: usize,
    pub trade_count: usize,
    pub volume_usdc: f64,
    pub last_activity_at: Option<i64>,
    pub addresses: Vec<AddressStats>,
}

/// Room totals plus a per-address breakdown.
///
/// `addresses` are (lowercase address, label) pairs; records from wallets
/// outside that list still count toward the totals.
pub fn summarize(
    addresses: &[(String, Option<String>)],
    activities: &[Activity],
    positions: &[Position],
) -> Summary {
    let mut per_address: Vec<AddressStats> = addresses
        .iter()
        .map(|(address, label)| AddressStats {
            address: address.clone(),
            label: label.clone(),
            position_value: 0.0,
            cash_pnl: 0.0,
            open_positions: 0,
            trade_count: 0,
            volume_usdc: 0.0,
            last_activity_at: None,
        })
        .collect();
    let lookup: HashMap<String, usize> = per_address
        .iter()
        .enumerate()
        .map(|(i, s)| (s.address.to_ascii_lowercase(), i))
        .collect();

    let mut summary = Summary {
        address_count: addresses.len(),
        position_value: 0.0,
        cost_basis: 0.0,
        cash_pnl: 0.0,
        percent_pnl: 0.0,
        open_markets: 0,
        trade_count: 0,
        volume_usdc: 0.0,
        last_activity_at: None,
        addresses: Vec::new(),
    };

    let mut markets: HashSet<&str> = HashSet::new();
    for p in positions {
        summary.position_value += p.current_value;
        summary.cost_basis += p.initial_value;
        summary.cash_pnl += p.cash_pnl;
        markets.insert(p.condition_id.as_str());
        if let Some(&i) = lookup.get(&p.proxy_wallet.to_ascii_lowercase()) {
            let s = &mut per_address[i];
            s.position_value += p.current_value;
            s.cash_pnl += p.cash_pnl;
            s.open_positions += 1;
        }
    }
    summary.open_markets = markets.len();
    summary.percent_pnl = percent_of(summary.cash_pnl, summary.cost_basis);

    for a in activities {
        summary.last_activity_at = summary.last_activity_at.max(Some(a.timestamp));
        if let Some(&i) = lookup.get(&a.proxy_wallet.to_ascii_lowercase()) {
            let s = &mut per_address[i];
            s.last_activity_at = s.last_activity_at.max(Some(a.timestamp));
            if a.kind == ActivityKind::Trade {
                s.trade_count += 1;
                s.volume_usdc += a.usdc_size;
            }
        }
        if a.kind == ActivityKind::Trade {
            summary.trade_count += 1;
            summary.volume_usdc += a.usdc_size;
        }
    }

    per_address.sort_by(|a, b| b.position_value.total_cmp(&a.position_value));
    summary.addresses = per_address;
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(wallet: &str, ts: i64, cond: &str, side: TradeSide, size: f64, price: f64) -> Activity {
        Activity {
            proxy_wallet: wallet.to_string(),
            timestamp: ts,
            condition_id: cond.to_string(),
            kind: ActivityKind::Trade,
            size,
            usdc_size: size * price,
            price,
            transaction_hash: format!("0xtx{}{}", wallet, ts),
            asset: format!("{}-yes", cond),
            side: Some(side),
            outcome_index: Some(0),
            title: Some(format!("Market {}", cond)),
            slug: None,
            icon: None,
            event_slug: None,
            outcome: Some("Yes".into()),
            name: None,
            pseudonym: None,
            label: None,
        }
    }

    fn position(wallet: &str, cond: &str, asset: &str, size: f64, avg: f64, cur: f64) -> Position {
        Position {
            proxy_wallet: wallet.to_string(),
            asset: asset.to_string(),
            condition_id: cond.to_string(),
            size,
            avg_price: avg,
            initial_value: size * avg,
            current_value: size * cur,
            cash_pnl: size * (cur - avg),
            percent_pnl: 0.0,
            total_bought: size,
            realized_pnl: 0.0,
            cur_price: cur,
            redeemable: false,
            mergeable: false,
            title: None,
            slug: None,
            icon: None,
            event_slug: None,
            outcome: Some("Yes".into()),
            outcome_index: Some(0),
            opposite_outcome: None,
            end_date: None,
            negative_risk: false,
            label: None,
        }
    }

    #[test]
    fn test_merge_dedupes_and_sorts_newest_first() {
        let a = trade("0xA", 100, "m1", TradeSide::Buy, 10.0, 0.4);
        let b = trade("0xB", 300, "m1", TradeSide::Buy, 5.0, 0.5);
        let c = trade("0xA", 200, "m2", TradeSide::Sell, 2.0, 0.9);
        let merged = merge_activities(vec![vec![a.clone(), c.clone()], vec![b, a.clone()]]);

        let ts: Vec<i64> = merged.iter().map(|x| x.timestamp).collect();
        assert_eq!(ts, vec![300, 200, 100]);
    }

    #[test]
    fn test_merge_keeps_distinct_fills_in_same_tx() {
        let a = trade("0xA", 100, "m1", TradeSide::Buy, 10.0, 0.4);
        let mut b = a.clone();
        b.size = 4.0;
        let merged = merge_activities(vec![vec![a, b]]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_dedupe_ignores_address_case() {
        let a = trade("0xAbC", 100, "m1", TradeSide::Buy, 10.0, 0.4);
        let mut b = a.clone();
        b.proxy_wallet = "0xabc".into();
        b.transaction_hash = b.transaction_hash.to_uppercase();
        assert_eq!(merge_activities(vec![vec![a], vec![b]]).len(), 1);
    }

    #[test]
    fn test_filter_by_kind_since_and_page() {
        let mut items = vec![
            trade("0xA", 500, "m1", TradeSide::Buy, 1.0, 0.5),
            trade("0xA", 400, "m1", TradeSide::Buy, 1.0, 0.5),
            trade("0xB", 300, "m1", TradeSide::Buy, 1.0, 0.5),
            trade("0xA", 100, "m1", TradeSide::Buy, 1.0, 0.5),
        ];
        items[1].kind = ActivityKind::Redeem;

        let page = filter_activities(
            items.clone(),
            &ActivityFilter {
                kind: Some(ActivityKind::Trade),
                since: Some(200),
                ..Default::default()
            },
        );
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].timestamp, 500);
        assert_eq!(page.items[1].timestamp, 300);

        let page = filter_activities(
            items,
            &ActivityFilter {
                wallet: Some("0xa".into()),
                offset: 1,
                limit: Some(1),
                ..Default::default()
            },
        );
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].timestamp, 400);
    }

    #[test]
    fn test_grouping_weighted_average_and_totals() {
        let items = vec![
            trade("0xA", 100, "m1", TradeSide::Buy, 10.0, 0.40),
            trade("0xA", 110, "m1", TradeSide::Buy, 30.0, 0.60),
            trade("0xA", 120, "m1", TradeSide::Sell, 5.0, 0.70),
            trade("0xB", 130, "m1", TradeSide::Buy, 7.0, 0.55),
        ];
        let groups = group_activities(&items, None);
        assert_eq!(groups.len(), 3);

        let buys = groups
            .iter()
            .find(|g| g.proxy_wallet == "0xA" && g.side == Some(TradeSide::Buy))
            .unwrap();
        assert_eq!(buys.count, 2);
        assert!((buys.total_size - 40.0).abs() < 1e-9);
        // (10*0.40 + 30*0.60) / 40 = 0.55
        assert!((buys.avg_price - 0.55).abs() < 1e-9);
        assert_eq!(buys.first_timestamp, 100);
        assert_eq!(buys.last_timestamp, 110);
        assert_eq!(buys.transaction_hashes.len(), 2);

        // newest group first
        assert_eq!(groups[0].proxy_wallet, "0xB");

        let in_size: f64 = items.iter().map(|a| a.size).sum();
        let out_size: f64 = groups.iter().map(|g| g.total_size).sum();
        let in_usdc: f64 = items.iter().map(|a| a.usdc_size).sum();
        let out_usdc: f64 = groups.iter().map(|g| g.total_usdc).sum();
        assert!((in_size - out_size).abs() < 1e-9);
        assert!((in_usdc - out_usdc).abs() < 1e-9);
    }

    #[test]
    fn test_grouping_window_splits_far_apart_trades() {
        let items = vec![
            trade("0xA", 1_000, "m1", TradeSide::Buy, 1.0, 0.5),
            trade("0xA", 1_050, "m1", TradeSide::Buy, 1.0, 0.5),
            trade("0xA", 5_000, "m1", TradeSide::Buy, 1.0, 0.5),
        ];
        let groups = group_activities(&items, Some(60));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].count, 1);
        assert_eq!(groups[0].last_timestamp, 5_000);
        assert_eq!(groups[1].count, 2);

        assert_eq!(group_activities(&items, None).len(), 1);
    }

    #[test]
    fn test_grouping_window_chains_from_latest_member() {
        // each gap is within the window even though the span is not
        let items = vec![
            trade("0xA", 0, "m1", TradeSide::Buy, 1.0, 0.5),
            trade("0xA", 50, "m1", TradeSide::Buy, 1.0, 0.5),
            trade("0xA", 100, "m1", TradeSide::Buy, 1.0, 0.5),
        ];
        assert_eq!(group_activities(&items, Some(60)).len(), 1);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(merge_activities(Vec::<Vec<Activity>>::new()).is_empty());
        assert!(group_activities(&[], Some(10)).is_empty());
        assert!(aggregate_positions(&[], PositionSort::Value).is_empty());
        let s = summarize(&[], &[], &[]);
        assert_eq!(s.percent_pnl, 0.0);
        assert_eq!(s.last_activity_at, None);
    }

    #[test]
    fn test_positions_roll_up_across_wallets() {
        let positions = vec![
            position("0xA", "m1", "t1", 100.0, 0.40, 0.50),
            position("0xB", "m1", "t1", 300.0, 0.60, 0.50),
            position("0xA", "m2", "t2", 10.0, 0.20, 0.90),
        ];
        let aggs = aggregate_positions(&positions, PositionSort::Value);
        assert_eq!(aggs.len(), 2);

        let m1 = &aggs[0];
        assert_eq!(m1.asset, "t1");
        assert!((m1.total_size - 400.0).abs() < 1e-9);
        // (100*0.40 + 300*0.60) / 400 = 0.55
        assert!((m1.avg_price - 0.55).abs() < 1e-9);
        assert!((m1.current_value - 200.0).abs() < 1e-9);
        assert!((m1.initial_value - 220.0).abs() < 1e-9);
        assert!((m1.cash_pnl - (-20.0)).abs() < 1e-9);
        assert!((m1.percent_pnl - (-20.0 / 220.0 * 100.0)).abs() < 1e-9);
        assert_eq!(m1.holders[0].proxy_wallet, "0xB");
        assert_eq!(m1.holders.len(), 2);
    }

    #[test]
    fn test_positions_drop_duplicate_wallet_token() {
        let p = position("0xA", "m1", "t1", 100.0, 0.40, 0.50);
        let mut dup = p.clone();
        dup.proxy_wallet = "0xa".into();
        let aggs = aggregate_positions(&[p, dup], PositionSort::Value);
        assert_eq!(aggs.len(), 1);
        assert!((aggs[0].total_size - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_positions_without_asset_key_on_market_and_outcome() {
        let mut m1_yes = position("0xA", "m1", "", 10.0, 0.40, 0.50);
        let mut m2_yes = position("0xA", "m2", "", 20.0, 0.30, 0.50);
        let mut m1_no = position("0xA", "m1", "", 5.0, 0.60, 0.50);
        m1_yes.outcome_index = Some(0);
        m2_yes.outcome_index = Some(0);
        m1_no.outcome_index = Some(1);
        let positions = vec![m1_yes, m2_yes, m1_no];

        let aggs = aggregate_positions(&positions, PositionSort::Size);
        assert_eq!(aggs.len(), 3);
        let total: f64 = aggs.iter().map(|a| a.total_size).sum();
        assert!((total - 35.0).abs() < 1e-9);
        assert_eq!(aggs[0].condition_id, "m2");

        let m1: Vec<_> = aggs.iter().filter(|a| a.condition_id == "m1").collect();
        assert_eq!(m1.len(), 2);
        assert!(m1.iter().any(|a| a.outcome_index == Some(1) && a.total_size == 5.0));
    }

    #[test]
    fn test_positions_roll_up_price_redeemable_and_realized() {
        let mut a = position("0xA", "m1", "t1", 10.0, 0.50, 0.0);
        let mut b = position("0xB", "m1", "t1", 10.0, 0.50, 0.70);
        let mut c = position("0xC", "m1", "t1", 10.0, 0.50, 0.90);
        a.realized_pnl = 1.5;
        b.realized_pnl = 2.5;
        b.redeemable = true;
        c.realized_pnl = -1.0;

        let aggs = aggregate_positions(&[a, b, c], PositionSort::Value);
        assert_eq!(aggs.len(), 1);
        let agg = &aggs[0];
        // first holder quotes zero, so the next non-zero price wins
        assert!((agg.cur_price - 0.70).abs() < 1e-9);
        assert!(agg.redeemable);
        assert!((agg.realized_pnl - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_positions_percent_zero_without_cost_basis() {
        let mut p = position("0xA", "m1", "t1", 10.0, 0.0, 0.50);
        p.initial_value = 0.0;
        p.cash_pnl = 5.0;
        let aggs = aggregate_positions(&[p], PositionSort::Percent);
        assert_eq!(aggs[0].percent_pnl, 0.0);
        assert!((aggs[0].cash_pnl - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_groups_with_same_last_timestamp_order_by_usdc() {
        let items = vec![
            trade("0xA", 100, "m1", TradeSide::Buy, 10.0, 0.5),
            trade("0xB", 100, "m1", TradeSide::Buy, 40.0, 0.5),
            trade("0xC", 100, "m1", TradeSide::Buy, 20.0, 0.5),
        ];
        let groups = group_activities(&items, None);
        let wallets: Vec<&str> = groups.iter().map(|g| g.proxy_wallet.as_str()).collect();
        assert_eq!(wallets, vec!["0xB", "0xC", "0xA"]);
    }

    #[test]
    fn test_position_sort_orders() {
        let positions = vec![
            position("0xA", "m1", "t1", 100.0, 0.50, 0.60), // value 60, pnl 10, pct 20
            position("0xA", "m2", "t2", 10.0, 0.10, 0.90),  // value 9, pnl 8, pct 800
            position("0xA", "m3", "t3", 500.0, 0.50, 0.40), // value 200, pnl -50
        ];
        let by = |s| -> Vec<String> {
            aggregate_positions(&positions, s)
                .into_iter()
                .map(|a| a.asset)
                .collect()
        };
        assert_eq!(by(PositionSort::Value), vec!["t3", "t1", "t2"]);
        assert_eq!(by(PositionSort::Pnl), vec!["t1", "t2", "t3"]);
        assert_eq!(by(PositionSort::Percent), vec!["t2", "t1", "t3"]);
        assert_eq!(by(PositionSort::Size), vec!["t3", "t1", "t2"]);
        assert_eq!(PositionSort::parse("PnL"), Some(PositionSort::Pnl));
        assert_eq!(PositionSort::parse("nope"), None);
    }

    #[test]
    fn test_summary_totals_and_breakdown() {
        let addresses = vec![
            ("0xa".to_string(), Some("alice".to_string())),
            ("0xb".to_string(), None),
        ];
        let mut redeem = trade("0xA", 900, "m1", TradeSide::Buy, 3.0, 1.0);
        redeem.kind = ActivityKind::Redeem;
        let activities = vec![
            trade("0xA", 100, "m1", TradeSide::Buy, 10.0, 0.5),
            trade("0xB", 200, "m2", TradeSide::Buy, 20.0, 0.5),
            redeem,
        ];
        let positions = vec![
            position("0xA", "m1", "t1", 10.0, 0.5, 0.6),
            position("0xB", "m2", "t2", 20.0, 0.5, 0.7),
            position("0xB", "m1", "t1", 5.0, 0.5, 0.6),
        ];
        let s = summarize(&addresses, &activities, &positions);

        assert_eq!(s.address_count, 2);
        assert_eq!(s.trade_count, 2);
        assert!((s.volume_usdc - 15.0).abs() < 1e-9);
        assert_eq!(s.open_markets, 2);
        assert!((s.position_value - 23.0).abs() < 1e-9);
        assert!((s.cost_basis - 17.5).abs() < 1e-9);
        assert!((s.cash_pnl - 5.5).abs() < 1e-9);
        assert_eq!(s.last_activity_at, Some(900));

        assert_eq!(s.addresses[0].address, "0xb");
        assert_eq!(s.addresses[0].open_positions, 2);
        assert_eq!(s.addresses[1].label.as_deref(), Some("alice"));
        assert_eq!(s.addresses[1].trade_count, 1);
        assert_eq!(s.addresses[1].last_activity_at, Some(900));
    }
}
