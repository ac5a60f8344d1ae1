//! In-memory room / address / post / comment store.
//!
//! One `RwLock` guards everything so cross-entity updates (room delete
//! detaching posts, post delete dropping comments) happen atomically.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use super::model::*;
use crate::error::{AppError, AppResult};

const DEFAULT_FEED_LIMIT: usize = 50;
const MAX_FEED_LIMIT: usize = 200;

#[derive(Debug, Default)]
struct Inner {
    rooms: HashMap<Uuid, Room>,
    posts: HashMap<Uuid, Post>,
    comments: HashMap<Uuid, Vec<Comment>>,
}

impl Inner {
    fn owned_room_mut(&mut self, owner: &str, id: Uuid) -> AppResult<&mut Room> {
        let room = self
            .rooms
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("room"))?;
        if !room.is_owned_by(owner) {
            return Err(AppError::forbidden("only the room owner can do that"));
        }
        Ok(room)
    }
}

#[derive(Debug)]
pub struct RoomStore {
    inner: RwLock<Inner>,
    max_addresses_per_room: usize,
}

impl RoomStore {
    pub fn new(max_addresses_per_room: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            max_addresses_per_room,
        }
    }

    // ─── Rooms ───

    pub async fn create_room(&self, owner: &str, input: NewRoom) -> AppResult<Room> {
        let name = required_text("name", &input.name, MAX_ROOM_NAME)?;
        let description =
            optional_text("description", input.description.as_deref(), MAX_ROOM_DESCRIPTION)?;
        let now = Utc::now();
        let room = Room {
            id: Uuid::new_v4(),
            owner_id: owner.to_string(),
            name,
            description,
            is_public: input.is_public,
            share_slug: new_share_slug(),
            addresses: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.inner.write().await.rooms.insert(room.id, room.clone());
        info!("🏠 Room created: {} ({}) owner={}", room.name, room.id, owner);
        Ok(room)
    }

    /// Caller's rooms, newest first.
    pub async fn list_rooms(&self, owner: &str) -> Vec<Room> {
        let inner = self.inner.read().await;
        let mut rooms: Vec<Room> = inner
            .rooms
            .values()
            .filter(|r| r.is_owned_by(owner))
            .cloned()
            .collect();
        rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rooms
    }

    pub async fn list_public_rooms(&self) -> Vec<PublicRoom> {
        let inner = self.inner.read().await;
        let mut rooms: Vec<&Room> = inner.rooms.values().filter(|r| r.is_public).collect();
        rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rooms.into_iter().map(PublicRoom::from).collect()
    }

    /// Owner always; anyone else only if the room is public.
    pub async fn get_room(&self, caller: &str, id: Uuid) -> AppResult<Room> {
        let inner = self.inner.read().await;
        let room = inner.rooms.get(&id).ok_or_else(|| AppError::not_found("room"))?;
        if !room.is_owned_by(caller) && !room.is_public {
            return Err(AppError::forbidden("room is private"));
        }
        Ok(room.clone())
    }

    /// Private rooms are indistinguishable from missing ones here.
    pub async fn room_by_slug(&self, slug: &str) -> AppResult<Room> {
        let inner = self.inner.read().await;
        inner
            .rooms
            .values()
            .find(|r| r.is_public && r.share_slug == slug)
            .cloned()
            .ok_or_else(|| AppError::not_found("room"))
    }

    pub async fn update_room(&self, owner: &str, id: Uuid, patch: RoomPatch) -> AppResult<Room> {
        let name = patch
            .name
            .as_deref()
            .map(|n| required_text("name", n, MAX_ROOM_NAME))
            .transpose()?;
        let description = patch
            .description
            .as_deref()
            .map(|d| optional_text("description", Some(d), MAX_ROOM_DESCRIPTION))
            .transpose()?;

        let mut inner = self.inner.write().await;
        let room = inner.owned_room_mut(owner, id)?;
        if let Some(name) = name {
            room.name = name;
        }
        if let Some(description) = description {
            room.description = description;
        }
        if let Some(is_public) = patch.is_public {
            room.is_public = is_public;
        }
        room.updated_at = Utc::now();
        Ok(room.clone())
    }

    /// Invalidates any previously shared link.
    pub async fn rotate_share_slug(&self, owner: &str, id: Uuid) -> AppResult<Room> {
        let mut inner = self.inner.write().await;
        let room = inner.owned_room_mut(owner, id)?;
        room.share_slug = new_share_slug();
        room.updated_at = Utc::now();
        Ok(room.clone())
    }

    /// Posts that referenced the room are kept but detached.
    pub async fn delete_room(&self, owner: &str, id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.owned_room_mut(owner, id)?;
        inner.rooms.remove(&id);
        let mut detached = 0usize;
        for post in inner.posts.values_mut() {
            if post.room_id == Some(id) {
                post.room_id = None;
                detached += 1;
            }
        }
        info!("🗑️ Room deleted: {} (detached {} posts)", id, detached);
        Ok(())
    }

    // ─── Tracked addresses ───

    pub async fn add_address(
        &self,
        owner: &str,
        id: Uuid,
        input: NewAddress,
    ) -> AppResult<TrackedAddress> {
        let (address, checksum) = normalize_address(&input.address)?;
        let label = optional_text("label", input.label.as_deref(), MAX_LABEL)?;
        let cap = self.max_addresses_per_room;

        let mut inner = self.inner.write().await;
        let room = inner.owned_room_mut(owner, id)?;
        if room.find_address(&address).is_some() {
            return Err(AppError::Conflict(format!(
                "{} is already tracked in this room",
                checksum
            )));
        }
        if room.addresses.len() >= cap {
            return Err(AppError::validation(format!(
                "a room can track at most {} addresses",
                cap
            )));
        }
        let tracked = TrackedAddress {
            address,
            checksum,
            label,
            added_at: Utc::now(),
        };
        room.addresses.push(tracked.clone());
        room.updated_at = Utc::now();
        info!("➕ {} added to room {}", tracked.checksum, id);
        Ok(tracked)
    }

    pub async fn update_address_label(
        &self,
        owner: &str,
        id: Uuid,
        address: &str,
        label: Option<String>,
    ) -> AppResult<TrackedAddress> {
        let (address, _) = normalize_address(address)?;
        let label = optional_text("label", label.as_deref(), MAX_LABEL)?;

        let mut inner = self.inner.write().await;
        let room = inner.owned_room_mut(owner, id)?;
        let tracked = room
            .addresses
            .iter_mut()
            .find(|a| a.address == address)
            .ok_or_else(|| AppError::not_found("address"))?;
        tracked.label = label;
        let updated = tracked.clone();
        room.updated_at = Utc::now();
        Ok(updated)
    }

    pub async fn remove_address(&self, owner: &str, id: Uuid, address: &str) -> AppResult<()> {
        let (address, _) = normalize_address(address)?;
        let mut inner = self.inner.write().await;
        let room = inner.owned_room_mut(owner, id)?;
        let before = room.addresses.len();
        room.addresses.retain(|a| a.address != address);
        if room.addresses.len() == before {
            return Err(AppError::not_found("address"));
        }
        room.updated_at = Utc::now();
        info!("➖ {} removed from room {}", address, id);
        Ok(())
    }

    // ─── Posts ───

    /// A post may reference a room the author owns or any public room.
    pub async fn create_post(&self, author: &str, input: NewPost) -> AppResult<Post> {
        let body = required_text("body", &input.body, MAX_POST_BODY)?;
        let mut inner = self.inner.write().await;
        if let Some(room_id) = input.room_id {
            let room = inner
                .rooms
                .get(&room_id)
                .ok_or_else(|| AppError::not_found("room"))?;
            if !room.is_owned_by(author) && !room.is_public {
                return Err(AppError::forbidden("cannot share a private room you do not own"));
            }
        }
        let post = Post {
            id: Uuid::new_v4(),
            author_id: author.to_string(),
            room_id: input.room_id,
            body,
            created_at: Utc::now(),
        };
        inner.posts.insert(post.id, post.clone());
        Ok(post)
    }

    /// Newest first.
    pub async fn feed(&self, query: &FeedQuery) -> Vec<PostView> {
        let inner = self.inner.read().await;
        let mut posts: Vec<&Post> = inner
            .posts
            .values()
            .filter(|p| query.room_id.map_or(true, |r| p.room_id == Some(r)))
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        let limit = query.limit.unwrap_or(DEFAULT_FEED_LIMIT).min(MAX_FEED_LIMIT);
        posts
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(limit)
            .map(|p| PostView {
                post: p.clone(),
                comment_count: inner.comments.get(&p.id).map_or(0, Vec::len),
            })
            .collect()
    }

    pub async fn delete_post(&self, author: &str, id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let post = inner.posts.get(&id).ok_or_else(|| AppError::not_found("post"))?;
        if post.author_id != author {
            return Err(AppError::forbidden("only the author can delete a post"));
        }
        inner.posts.remove(&id);
        inner.comments.remove(&id);
        Ok(())
    }

    // ─── Comments ───

    pub async fn add_comment(&self, author: &str, post_id: Uuid, input: NewComment) -> AppResult<Comment> {
        let body = required_text("body", &input.body, MAX_COMMENT_BODY)?;
        let mut inner = self.inner.write().await;
        if !inner.posts.contains_key(&post_id) {
            return Err(AppError::not_found("post"));
        }
        let comment = Comment {
            id: Uuid::new_v4(),
            post_id,
            author_id: author.to_string(),
            body,
            created_at: Utc::now(),
        };
        inner.comments.entry(post_id).or_default().push(comment.clone());
        Ok(comment)
    }

    /// Oldest first (insertion order).
    pub async fn comments(&self, post_id: Uuid) -> AppResult<Vec<Comment>> {
        let inner = self.inner.read().await;
        if !inner.posts.contains_key(&post_id) {
            return Err(AppError::not_found("post"));
        }
        Ok(inner.comments.get(&post_id).cloned().unwrap_or_default())
    }

    pub async fn delete_comment(&self, author: &str, post_id: Uuid, comment_id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let comments = inner
            .comments
            .get_mut(&post_id)
            .ok_or_else(|| AppError::not_found("comment"))?;
        let pos = comments
            .iter()
            .position(|c| c.id == comment_id)
            .ok_or_else(|| AppError::not_found("comment"))?;
        if comments[pos].author_id != author {
            return Err(AppError::forbidden("only the author can delete a comment"));
        }
        comments.remove(pos);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";
    const ADDR2: &str = "0x0000000000000000000000000000000000000001";

    fn new_room(name: &str, is_public: bool) -> NewRoom {
        NewRoom {
            name: name.to_string(),
            description: None,
            is_public,
        }
    }

    #[tokio::test]
    async fn test_room_lifecycle() {
        let store = RoomStore::new(10);
        let room = store.create_room("alice", new_room(" Whales ", false)).await.unwrap();
        assert_eq!(room.name, "Whales");
        assert_eq!(store.list_rooms("alice").await.len(), 1);
        assert!(store.list_rooms("bob").await.is_empty());

        let patched = store
            .update_room(
                "alice",
                room.id,
                RoomPatch {
                    description: Some("big bettors".into()),
                    is_public: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(patched.is_public);
        assert_eq!(patched.description.as_deref(), Some("big bettors"));
        assert_eq!(patched.name, "Whales");

        store.delete_room("alice", room.id).await.unwrap();
        assert!(matches!(
            store.get_room("alice", room.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_room_validation() {
        let store = RoomStore::new(10);
        assert!(matches!(
            store.create_room("alice", new_room("   ", false)).await,
            Err(AppError::Validation(_))
        ));
        let long = "x".repeat(MAX_ROOM_NAME + 1);
        assert!(store.create_room("alice", new_room(&long, false)).await.is_err());
    }

    #[tokio::test]
    async fn test_private_room_access() {
        let store = RoomStore::new(10);
        let room = store.create_room("alice", new_room("r", false)).await.unwrap();

        assert!(matches!(
            store.get_room("bob", room.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            store.update_room("bob", room.id, RoomPatch::default()).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(store.room_by_slug(&room.share_slug).await.is_err());
        assert!(store.list_public_rooms().await.is_empty());
    }

    #[tokio::test]
    async fn test_public_room_by_slug_and_rotation() {
        let store = RoomStore::new(10);
        let room = store.create_room("alice", new_room("r", true)).await.unwrap();
        assert_eq!(store.room_by_slug(&room.share_slug).await.unwrap().id, room.id);
        assert!(store.get_room("bob", room.id).await.is_ok());

        let rotated = store.rotate_share_slug("alice", room.id).await.unwrap();
        assert_ne!(rotated.share_slug, room.share_slug);
        assert!(store.room_by_slug(&room.share_slug).await.is_err());
        assert!(store.room_by_slug(&rotated.share_slug).await.is_ok());
        assert_eq!(store.list_public_rooms().await.len(), 1);
    }

    #[tokio::test]
    async fn test_address_tracking() {
        let store = RoomStore::new(2);
        let room = store.create_room("alice", new_room("r", false)).await.unwrap();

        let tracked = store
            .add_address(
                "alice",
                room.id,
                NewAddress {
                    address: ADDR.to_lowercase(),
                    label: Some("vitalik".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(tracked.checksum, ADDR);

        // same address, different case
        let dup = store
            .add_address(
                "alice",
                room.id,
                NewAddress {
                    address: ADDR.to_string(),
                    label: None,
                },
            )
            .await;
        assert!(matches!(dup, Err(AppError::Conflict(_))));

        store
            .add_address("alice", room.id, NewAddress { address: ADDR2.into(), label: None })
            .await
            .unwrap();
        let over = store
            .add_address(
                "alice",
                room.id,
                NewAddress {
                    address: "0x0000000000000000000000000000000000000002".into(),
                    label: None,
                },
            )
            .await;
        assert!(matches!(over, Err(AppError::Validation(_))));

        let relabeled = store
            .update_address_label("alice", room.id, ADDR, Some("  ".into()))
            .await
            .unwrap();
        assert_eq!(relabeled.label, None);

        store.remove_address("alice", room.id, ADDR).await.unwrap();
        assert!(matches!(
            store.remove_address("alice", room.id, ADDR).await,
            Err(AppError::NotFound(_))
        ));
        let room = store.get_room("alice", room.id).await.unwrap();
        assert_eq!(room.addresses.len(), 1);
    }

    #[tokio::test]
    async fn test_add_address_rejects_garbage() {
        let store = RoomStore::new(2);
        let room = store.create_room("alice", new_room("r", false)).await.unwrap();
        let res = store
            .add_address("alice", room.id, NewAddress { address: "vitalik.eth".into(), label: None })
            .await;
        assert!(matches!(res, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_posts_and_comments() {
        let store = RoomStore::new(2);
        let private = store.create_room("alice", new_room("p", false)).await.unwrap();

        assert!(matches!(
            store
                .create_post("bob", NewPost { body: "look".into(), room_id: Some(private.id) })
                .await,
            Err(AppError::Forbidden(_))
        ));

        let p1 = store
            .create_post("alice", NewPost { body: "first".into(), room_id: Some(private.id) })
            .await
            .unwrap();
        let p2 = store
            .create_post("bob", NewPost { body: "second".into(), room_id: None })
            .await
            .unwrap();

        store
            .add_comment("bob", p1.id, NewComment { body: "nice".into() })
            .await
            .unwrap();
        let c2 = store
            .add_comment("alice", p1.id, NewComment { body: "thanks".into() })
            .await
            .unwrap();

        let feed = store.feed(&FeedQuery::default()).await;
        assert_eq!(feed.len(), 2);
        let v1 = feed.iter().find(|v| v.post.id == p1.id).unwrap();
        assert_eq!(v1.comment_count, 2);

        let only_room = store
            .feed(&FeedQuery { room_id: Some(private.id), ..Default::default() })
            .await;
        assert_eq!(only_room.len(), 1);

        let comments = store.comments(p1.id).await.unwrap();
        assert_eq!(comments[0].body, "nice");
        assert_eq!(comments[1].id, c2.id);

        assert!(matches!(
            store.delete_comment("bob", p1.id, c2.id).await,
            Err(AppError::Forbidden(_))
        ));
        store.delete_comment("alice", p1.id, c2.id).await.unwrap();
        assert_eq!(store.comments(p1.id).await.unwrap().len(), 1);

        assert!(matches!(
            store.delete_post("alice", p2.id).await,
            Err(AppError::Forbidden(_))
        ));
        store.delete_post("alice", p1.id).await.unwrap();
        assert!(matches!(store.comments(p1.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_room_detaches_posts() {
        let store = RoomStore::new(2);
        let room = store.create_room("alice", new_room("r", true)).await.unwrap();
        let post = store
            .create_post("bob", NewPost { body: "hi".into(), room_id: Some(room.id) })
            .await
            .unwrap();
        store.delete_room("alice", room.id).await.unwrap();

        let feed = store.feed(&FeedQuery::default()).await;
        assert_eq!(feed[0].post.id, post.id);
        assert_eq!(feed[0].post.room_id, None);
    }

    #[tokio::test]
    async fn test_feed_paging() {
        let store = RoomStore::new(2);
        for i in 0..5 {
            store
                .create_post("alice", NewPost { body: format!("p{}", i), room_id: None })
                .await
                .unwrap();
        }
        let page = store
            .feed(&FeedQuery { offset: Some(3), limit: Some(10), ..Default::default() })
            .await;
        assert_eq!(page.len(), 2);
    }
}
