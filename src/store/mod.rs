//! Persistence backends. Exactly one is active per deployment.

mod memory;
#[cfg(any(feature = "postgres", feature = "mysql"))]
mod sql;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Message, UserRecord};
use crate::room::{ActiveCall, Room};

pub use memory::MemoryStore;
#[cfg(any(feature = "postgres", feature = "mysql"))]
pub use sql::{Dialect, SqlStore};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("user name already taken")]
    DuplicateName,
    #[error("record not found")]
    Missing,
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[cfg(any(feature = "postgres", feature = "mysql"))]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("unsupported database url: {0}")]
    UnsupportedUrl(String),
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn create_user(&self, user: UserRecord) -> Result<(), StoreError>;
    async fn find_user_by_name(&self, name: &str) -> Result<Option<UserRecord>, StoreError>;
    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, StoreError>;
    async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError>;

    /// Persists a new room with its initial member list. Messages on the
    /// passed room are ignored.
    async fn create_room(&self, room: &Room) -> Result<(), StoreError>;
    /// Room metadata and members, without history.
    async fn get_room(&self, id: &str) -> Result<Option<Room>, StoreError>;
    /// Rooms `user_id` belongs to, plus every public room.
    async fn list_rooms_for_user(&self, user_id: &str) -> Result<Vec<Room>, StoreError>;
    /// Removes the room, its members and its messages. Returns whether it existed.
    async fn delete_room(&self, id: &str) -> Result<bool, StoreError>;
    async fn add_member(&self, room_id: &str, user_id: &str) -> Result<bool, StoreError>;
    async fn remove_member(&self, room_id: &str, user_id: &str) -> Result<bool, StoreError>;
    async fn set_active_call(&self, room_id: &str, call: Option<&ActiveCall>) -> Result<(), StoreError>;

    async fn append_message(&self, message: &Message) -> Result<(), StoreError>;
    async fn get_message(&self, room_id: &str, id: &str) -> Result<Option<Message>, StoreError>;
    /// Overwrites reactions, poll and status of a stored message.
    async fn update_message(&self, message: &Message) -> Result<(), StoreError>;
    /// History oldest first; with a limit, the most recent `limit` messages.
    async fn list_messages(&self, room_id: &str, limit: Option<usize>) -> Result<Vec<Message>, StoreError>;
}
