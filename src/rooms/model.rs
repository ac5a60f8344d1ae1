use std::str::FromStr;

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const MAX_ROOM_NAME: usize = 80;
pub const MAX_ROOM_DESCRIPTION: usize = 500;
pub const MAX_LABEL: usize = 40;
pub const MAX_POST_BODY: usize = 2000;
pub const MAX_COMMENT_BODY: usize = 1000;
pub const SHARE_SLUG_LEN: usize = 10;

// ─────────────────────────────────────────────────────────
// Entities
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedAddress {
    /// Lowercase 0x form, used as the lookup key and for API calls.
    pub address: String,
    /// EIP-55 checksummed form for display.
    pub checksum: String,
    pub label: Option<String>,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub share_slug: String,
    pub addresses: Vec<TrackedAddress>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Room {
    pub fn is_owned_by(&self, user: &str) -> bool {
        self.owner_id == user
    }

    pub fn find_address(&self, address: &str) -> Option<&TrackedAddress> {
        self.addresses.iter().find(|a| a.address == address)
    }

    /// (lowercase address, label) pairs, the shape aggregation expects.
    pub fn address_labels(&self) -> Vec<(String, Option<String>)> {
        self.addresses
            .iter()
            .map(|a| (a.address.clone(), a.label.clone()))
            .collect()
    }
}

/// What anonymous visitors see of a public room.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicRoom {
    pub name: String,
    pub description: Option<String>,
    pub share_slug: String,
    pub addresses: Vec<TrackedAddress>,
    pub created_at: DateTime<Utc>,
}

impl From<&Room> for PublicRoom {
    fn from(room: &Room) -> Self {
        Self {
            name: room.name.clone(),
            description: room.description.clone(),
            share_slug: room.share_slug.clone(),
            addresses: room.addresses.clone(),
            created_at: room.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub author_id: String,
    pub room_id: Option<Uuid>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub comment_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────
// Inputs
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRoom {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPatch {
    pub name: Option<String>,
    /// `Some("")` clears the description.
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAddress {
    pub address: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabelPatch {
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub body: String,
    #[serde(default)]
    pub room_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewComment {
    pub body: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    pub room_id: Option<Uuid>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

// ─────────────────────────────────────────────────────────
// Validation helpers
// ─────────────────────────────────────────────────────────

/// Parse a 20-byte hex address. Returns (lowercase, checksummed).
pub fn normalize_address(raw: &str) -> AppResult<(String, String)> {
    let trimmed = raw.trim();
    let addr = Address::from_str(trimmed)
        .map_err(|_| AppError::validation(format!("invalid address: {}", trimmed)))?;
    let checksum = addr.to_checksum(None);
    Ok((checksum.to_ascii_lowercase(), checksum))
}

pub(crate) fn required_text(field: &str, raw: &str, max: usize) -> AppResult<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(AppError::validation(format!("{} must not be empty", field)));
    }
    if value.chars().count() > max {
        return Err(AppError::validation(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(value.to_string())
}

/// Blank → `None`.
pub(crate) fn optional_text(field: &str, raw: Option<&str>, max: usize) -> AppResult<Option<String>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => required_text(field, v, max).map(Some),
    }
}

pub(crate) fn new_share_slug() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SHARE_SLUG_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_address() {
        let (lower, checksum) =
            normalize_address("  0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045 ").unwrap();
        assert_eq!(lower, "0xd8da6bf26964af9d7eed9e03e53415d37aa96045");
        assert_eq!(checksum, "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045");

        let (lower2, _) = normalize_address("0xd8da6bf26964af9d7eed9e03e53415d37aa96045").unwrap();
        assert_eq!(lower, lower2);
    }

    #[test]
    fn test_rejects_bad_addresses() {
        assert!(normalize_address("").is_err());
        assert!(normalize_address("0x1234").is_err());
        assert!(normalize_address("0xzz8da6bf26964af9d7eed9e03e53415d37aa9604").is_err());
    }

    #[test]
    fn test_text_validation() {
        assert_eq!(required_text("name", "  hi ", 5).unwrap(), "hi");
        assert!(required_text("name", "   ", 5).is_err());
        assert!(required_text("name", "toolong", 5).is_err());
        assert_eq!(optional_text("d", Some("  "), 5).unwrap(), None);
        assert_eq!(optional_text("d", None, 5).unwrap(), None);
    }

    #[test]
    fn test_share_slug_shape() {
        let a = new_share_slug();
        assert_eq!(a.len(), SHARE_SLUG_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, new_share_slug());
    }
}
