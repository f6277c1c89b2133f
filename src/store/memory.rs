use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ChatStore, StoreError};
use crate::models::{Message, UserRecord};
use crate::room::{ActiveCall, Privacy, Room};

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, UserRecord>>,
    rooms: RwLock<HashMap<String, Room>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn create_user(&self, user: UserRecord) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.name == user.name) {
            return Err(StoreError::DuplicateName);
        }
        users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn find_user_by_name(&self, name: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.name == name).cloned())
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        let users = self.users.read().await;
        let mut list: Vec<_> = users.values().cloned().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(list)
    }

    async fn create_room(&self, room: &Room) -> Result<(), StoreError> {
        let mut rooms = self.rooms.write().await;
        let stored = Room {
            messages: Vec::new(),
            ..room.clone()
        };
        rooms.insert(room.id.clone(), stored);
        Ok(())
    }

    async fn get_room(&self, id: &str) -> Result<Option<Room>, StoreError> {
        let rooms = self.rooms.read().await;
        Ok(rooms.get(id).map(|room| Room {
            messages: Vec::new(),
            ..room.clone()
        }))
    }

    async fn list_rooms_for_user(&self, user_id: &str) -> Result<Vec<Room>, StoreError> {
        let rooms = self.rooms.read().await;
        let mut list: Vec<Room> = rooms
            .values()
            .filter(|room| room.privacy == Privacy::Public || room.is_member(user_id))
            .map(|room| Room {
                messages: Vec::new(),
                ..room.clone()
            })
            .collect();
        list.sort_by_key(|room| room.created_at);
        Ok(list)
    }

    async fn delete_room(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.rooms.write().await.remove(id).is_some())
    }

    async fn add_member(&self, room_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(room_id).ok_or(StoreError::Missing)?;
        Ok(room.add_member(user_id))
    }

    async fn remove_member(&self, room_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(room_id).ok_or(StoreError::Missing)?;
        Ok(room.remove_member(user_id))
    }

    async fn set_active_call(&self, room_id: &str, call: Option<&ActiveCall>) -> Result<(), StoreError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(room_id).ok_or(StoreError::Missing)?;
        room.active_call = call.cloned();
        Ok(())
    }

    async fn append_message(&self, message: &Message) -> Result<(), StoreError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(&message.room_id).ok_or(StoreError::Missing)?;
        room.messages.push(message.clone());
        Ok(())
    }

    async fn get_message(&self, room_id: &str, id: &str) -> Result<Option<Message>, StoreError> {
        let rooms = self.rooms.read().await;
        Ok(rooms
            .get(room_id)
            .and_then(|room| room.messages.iter().find(|m| m.id == id))
            .cloned())
    }

    async fn update_message(&self, message: &Message) -> Result<(), StoreError> {
        let mut rooms = self.rooms.write().await;
        let stored = rooms
            .get_mut(&message.room_id)
            .and_then(|room| room.messages.iter_mut().find(|m| m.id == message.id))
            .ok_or(StoreError::Missing)?;
        stored.reactions.clone_from(&message.reactions);
        stored.poll.clone_from(&message.poll);
        stored.status = message.status;
        Ok(())
    }

    async fn list_messages(&self, room_id: &str, limit: Option<usize>) -> Result<Vec<Message>, StoreError> {
        let rooms = self.rooms.read().await;
        let Some(room) = rooms.get(room_id) else {
            return Ok(Vec::new());
        };
        let skip = limit.map_or(0, |limit| room.messages.len().saturating_sub(limit));
        Ok(room.messages[skip..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageDraft, MessageStatus};
    use crate::room::{NewRoom, RoomType};

    fn user(id: &str, name: &str) -> UserRecord {
        UserRecord {
            id: id.to_string(),
            name: name.to_string(),
            password_hash: "x".to_string(),
            profile_picture: None,
        }
    }

    fn room(creator: &str, privacy: Privacy) -> Room {
        Room::new(
            NewRoom {
                name: "Room".to_string(),
                kind: RoomType::Group,
                privacy,
                ..NewRoom::default()
            },
            creator,
        )
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let store = MemoryStore::new();
        store.create_user(user("1", "alice")).await.unwrap();
        let err = store.create_user(user("2", "alice")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateName));
        assert_eq!(store.find_user_by_name("alice").await.unwrap().unwrap().id, "1");
    }

    #[tokio::test]
    async fn room_visibility() {
        let store = MemoryStore::new();
        let public = room("alice", Privacy::Public);
        let private = room("alice", Privacy::Private);
        store.create_room(&public).await.unwrap();
        store.create_room(&private).await.unwrap();

        assert_eq!(store.list_rooms_for_user("alice").await.unwrap().len(), 2);
        let for_bob = store.list_rooms_for_user("bob").await.unwrap();
        assert_eq!(for_bob.len(), 1);
        assert_eq!(for_bob[0].id, public.id);

        assert!(store.add_member(&private.id, "bob").await.unwrap());
        assert!(!store.add_member(&private.id, "bob").await.unwrap());
        assert_eq!(store.list_rooms_for_user("bob").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn message_history_and_updates() {
        let store = MemoryStore::new();
        let room = room("alice", Privacy::Public);
        store.create_room(&room).await.unwrap();

        for i in 0..5 {
            let msg = MessageDraft::text(format!("m{i}")).into_message(
                format!("id{i}"),
                room.id.clone(),
                "alice".into(),
                MessageStatus::Sent,
                None,
            );
            store.append_message(&msg).await.unwrap();
        }

        let last_two = store.list_messages(&room.id, Some(2)).await.unwrap();
        assert_eq!(last_two.iter().map(|m| m.text.as_str()).collect::<Vec<_>>(), ["m3", "m4"]);

        let mut msg = store.get_message(&room.id, "id1").await.unwrap().unwrap();
        msg.toggle_reaction("🎉", "bob");
        msg.status = MessageStatus::Seen;
        store.update_message(&msg).await.unwrap();

        let stored = store.get_message(&room.id, "id1").await.unwrap().unwrap();
        assert_eq!(stored.reactions.len(), 1);
        assert_eq!(stored.status, MessageStatus::Seen);

        assert!(store.get_room(&room.id).await.unwrap().unwrap().messages.is_empty());
        assert!(store.delete_room(&room.id).await.unwrap());
        assert!(store.list_messages(&room.id, None).await.unwrap().is_empty());
    }
}
