use serde::{Deserialize, Serialize};

use crate::crypto::generate_join_key;
use crate::models::{new_id, now_millis, Message, RoomId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    /// Notes to self, one member.
    #[serde(rename = "self")]
    SelfNotes,
    Ai,
    #[default]
    Group,
}

impl RoomType {
    pub fn as_str(self) -> &'static str {
        match self {
            RoomType::SelfNotes => "self",
            RoomType::Ai => "ai",
            RoomType::Group => "group",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "self" => Some(RoomType::SelfNotes),
            "ai" => Some(RoomType::Ai),
            "group" => Some(RoomType::Group),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    #[default]
    Public,
    Private,
}

impl Privacy {
    pub fn as_str(self) -> &'static str {
        match self {
            Privacy::Public => "public",
            Privacy::Private => "private",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "public" => Some(Privacy::Public),
            "private" => Some(Privacy::Private),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCall {
    pub id: String,
    pub kind: CallKind,
    pub started_by: UserId,
    pub started_at: i64,
    pub participants: Vec<UserId>,
}

impl ActiveCall {
    pub fn start(kind: CallKind, started_by: &str) -> Self {
        ActiveCall {
            id: new_id(),
            kind,
            started_by: started_by.to_string(),
            started_at: now_millis(),
            participants: vec![started_by.to_string()],
        }
    }

    pub fn join(&mut self, user_id: &str) -> bool {
        if self.participants.iter().any(|p| p == user_id) {
            return false;
        }
        self.participants.push(user_id.to_string());
        true
    }

    /// Removes the participant. Returns `true` when nobody is left.
    pub fn leave(&mut self, user_id: &str) -> bool {
        self.participants.retain(|p| p != user_id);
        self.participants.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: RoomType,
    pub users: Vec<UserId>,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub privacy: Privacy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_call: Option<ActiveCall>,
    pub created_by: UserId,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_key: Option<String>,
}

/// Request to create a room, shared by the socket event and `POST /api/rooms`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRoom {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: RoomType,
    #[serde(default)]
    pub privacy: Privacy,
    #[serde(default)]
    pub users: Vec<UserId>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Room {
    /// Builds a room owned by `creator`. `self` rooms never take extra members;
    /// other types take the requested users minus duplicates.
    pub fn new(request: NewRoom, creator: &str) -> Self {
        let id = new_id();
        let mut users = vec![creator.to_string()];
        if request.kind != RoomType::SelfNotes {
            for user in request.users {
                if !users.contains(&user) {
                    users.push(user);
                }
            }
        }

        let join_key = match request.privacy {
            Privacy::Private => Some(generate_join_key(&id, request.password.as_deref())),
            Privacy::Public => None,
        };

        Room {
            id,
            name: request.name.trim().to_string(),
            kind: request.kind,
            users,
            messages: Vec::new(),
            privacy: request.privacy,
            active_call: None,
            created_by: creator.to_string(),
            created_at: now_millis(),
            join_key,
        }
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.users.iter().any(|u| u == user_id)
    }

    pub fn add_member(&mut self, user_id: &str) -> bool {
        if self.is_member(user_id) {
            return false;
        }
        self.users.push(user_id.to_string());
        true
    }

    pub fn remove_member(&mut self, user_id: &str) -> bool {
        let before = self.users.len();
        self.users.retain(|u| u != user_id);
        self.users.len() != before
    }

    /// Whether `user_id` may enter this room with the given key.
    pub fn can_join(&self, user_id: &str, join_key: Option<&str>) -> bool {
        if self.is_member(user_id) {
            return true;
        }
        if self.kind == RoomType::SelfNotes {
            return false;
        }
        match self.privacy {
            Privacy::Public => true,
            Privacy::Private => match (&self.join_key, join_key) {
                (Some(expected), Some(given)) => expected == given,
                _ => false,
            },
        }
    }

    pub fn can_read(&self, user_id: &str) -> bool {
        self.privacy == Privacy::Public || self.is_member(user_id)
    }

    /// Copy without history, with the join key hidden from non-members.
    pub fn summary_for(&self, user_id: &str) -> Room {
        Room {
            messages: Vec::new(),
            join_key: if self.is_member(user_id) {
                self.join_key.clone()
            } else {
                None
            },
            ..self.clone()
        }
    }
}
