//! Records returned by the Polymarket Data API.
//!
//! The API is loosely typed: numbers sometimes arrive as strings, display
//! fields are often `null`, and `side` is an empty string for anything that
//! is not a trade. Everything here decodes leniently into defaults.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    Trade,
    Split,
    Merge,
    Redeem,
    Reward,
    Conversion,
    #[default]
    #[serde(other)]
    Other,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Trade => "TRADE",
            ActivityKind::Split => "SPLIT",
            ActivityKind::Merge => "MERGE",
            ActivityKind::Redeem => "REDEEM",
            ActivityKind::Reward => "REWARD",
            ActivityKind::Conversion => "CONVERSION",
            ActivityKind::Other => "OTHER",
        }
    }

    /// Case-insensitive parse, used for query strings.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "TRADE" => Some(ActivityKind::Trade),
            "SPLIT" => Some(ActivityKind::Split),
            "MERGE" => Some(ActivityKind::Merge),
            "REDEEM" => Some(ActivityKind::Redeem),
            "REWARD" => Some(ActivityKind::Reward),
            "CONVERSION" => Some(ActivityKind::Conversion),
            "OTHER" => Some(ActivityKind::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }
}

/// One trade / redemption / split / ... event for a wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(default, deserialize_with = "string_or_default")]
    pub proxy_wallet: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub timestamp: i64,
    #[serde(default, deserialize_with = "string_or_default")]
    pub condition_id: String,
    #[serde(rename = "type", default, deserialize_with = "lenient_kind")]
    pub kind: ActivityKind,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub size: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub usdc_size: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price: f64,
    #[serde(default, deserialize_with = "string_or_default")]
    pub transaction_hash: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub asset: String,
    #[serde(default, deserialize_with = "side_or_none")]
    pub side: Option<TradeSide>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub outcome_index: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub event_slug: Option<String>,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub pseudonym: Option<String>,
    /// Room nickname for `proxy_wallet`; filled in by the tracker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A wallet's holding of one outcome token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    #[serde(default, deserialize_with = "string_or_default")]
    pub proxy_wallet: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub asset: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub condition_id: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub size: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub avg_price: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub initial_value: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub current_value: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub cash_pnl: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub percent_pnl: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_bought: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub realized_pnl: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub cur_price: f64,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub redeemable: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub mergeable: bool,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub event_slug: Option<String>,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub outcome_index: Option<i64>,
    #[serde(default)]
    pub opposite_outcome: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub negative_risk: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

// ─────────────────────────────────────────────────────────
// Lenient decoders
// ─────────────────────────────────────────────────────────

fn value_as_f64(v: &Value) -> Option<f64> {
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
        .filter(|f| f.is_finite())
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(value_as_f64(&v).unwrap_or(0.0))
}

fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    Ok(lenient_opt_i64(d)?.unwrap_or(0))
}

fn lenient_opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(v.as_i64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
        .or_else(|| value_as_f64(&v).map(|f| f as i64)))
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::Bool(b) => b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    })
}

fn string_or_default<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

fn lenient_kind<'de, D: Deserializer<'de>>(d: D) -> Result<ActivityKind, D::Error> {
    let raw = Option::<String>::deserialize(d)?;
    Ok(raw
        .as_deref()
        .and_then(ActivityKind::parse)
        .unwrap_or_default())
}

fn side_or_none<'de, D: Deserializer<'de>>(d: D) -> Result<Option<TradeSide>, D::Error> {
    let raw = Option::<String>::deserialize(d)?;
    Ok(match raw.as_deref().map(str::trim) {
        Some(s) if s.eq_ignore_ascii_case("BUY") => Some(TradeSide::Buy),
        Some(s) if s.eq_ignore_ascii_case("SELL") => Some(TradeSide::Sell),
        _ => None,
    })
}
