pub mod model;
pub mod store;

pub use model::{Comment, Post, PostView, PublicRoom, Room, TrackedAddress};
pub use store::RoomStore;
