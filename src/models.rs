use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = String;
pub type RoomId = String;
pub type MessageId = String;

/// Unix time in milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

/// Stored form of a user. Never leaves the server.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub password_hash: String,
    pub profile_picture: Option<String>,
}

impl UserRecord {
    pub fn to_user(&self, is_online: bool) -> User {
        User {
            id: self.id.clone(),
            name: self.name.clone(),
            is_online,
            profile_picture: self.profile_picture.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Poll,
    File,
    Audio,
    Location,
    System,
}

/// Delivery state of a message. Ordering is significant: status only moves
/// towards `Seen`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sending,
    #[default]
    Sent,
    Delivered,
    Seen,
}

impl MessageStatus {
    /// Moves to `next` if it is further along. Returns whether anything changed.
    pub fn advance(&mut self, next: MessageStatus) -> bool {
        if next > *self {
            *self = next;
            true
        } else {
            false
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::Sending => "sending",
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Seen => "seen",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: String,
    pub users: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub votes: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    pub id: String,
    pub question: String,
    pub options: Vec<PollOption>,
}

/// What a client submits when it wants to start a poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollDraft {
    pub question: String,
    pub options: Vec<String>,
}

impl PollDraft {
    pub fn is_valid(&self) -> bool {
        !self.question.trim().is_empty()
            && self.options.iter().filter(|o| !o.trim().is_empty()).count() >= 2
    }
}

impl Poll {
    /// Option ids are positional so an optimistic copy on the client and the
    /// server's copy agree before the echo arrives.
    pub fn from_draft(draft: &PollDraft) -> Self {
        let options = draft
            .options
            .iter()
            .map(|text| text.trim())
            .filter(|text| !text.is_empty())
            .enumerate()
            .map(|(i, text)| PollOption {
                id: format!("opt-{i}"),
                text: text.to_string(),
                votes: Vec::new(),
            })
            .collect();

        Poll {
            id: new_id(),
            question: draft.question.trim().to_string(),
            options,
        }
    }

    /// Single-choice toggle. Voting for the option the user already holds
    /// withdraws the vote; voting elsewhere moves it. Returns `false` when the
    /// option does not exist.
    pub fn toggle_vote(&mut self, option_id: &str, user_id: &str) -> bool {
        if !self.options.iter().any(|o| o.id == option_id) {
            return false;
        }

        let had_vote = self
            .options
            .iter()
            .any(|o| o.id == option_id && o.votes.iter().any(|v| v == user_id));

        for option in &mut self.options {
            option.votes.retain(|v| v != user_id);
            if option.id == option_id && !had_vote {
                option.votes.push(user_id.to_string());
            }
        }
        true
    }

    pub fn vote_of(&self, user_id: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.votes.iter().any(|v| v == user_id))
            .map(|o| o.id.as_str())
    }

    pub fn total_votes(&self) -> usize {
        self.options.iter().map(|o| o.votes.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: usize,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioClip {
    pub url: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub author: UserId,
    pub timestamp: i64,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<Poll>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioClip>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default)]
    pub status: MessageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

/// The user-supplied part of a message, shared by the socket event and the
/// client's optimistic path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageDraft {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<PollDraft>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioClip>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl MessageDraft {
    pub fn text(text: impl Into<String>) -> Self {
        MessageDraft {
            text: text.into(),
            ..MessageDraft::default()
        }
    }

    /// A draft with only whitespace and no payload carries nothing to send.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
            && self.poll.is_none()
            && self.file.is_none()
            && self.audio.is_none()
            && self.location.is_none()
    }

    pub fn kind(&self) -> MessageKind {
        if self.poll.is_some() {
            MessageKind::Poll
        } else if self.file.is_some() {
            MessageKind::File
        } else if self.audio.is_some() {
            MessageKind::Audio
        } else if self.location.is_some() {
            MessageKind::Location
        } else {
            MessageKind::Text
        }
    }

    pub fn into_message(
        self,
        id: MessageId,
        room_id: RoomId,
        author: UserId,
        status: MessageStatus,
        client_id: Option<String>,
    ) -> Message {
        let kind = self.kind();
        Message {
            id,
            room_id,
            author,
            timestamp: now_millis(),
            text: self.text.trim().to_string(),
            kind,
            reactions: Vec::new(),
            poll: self.poll.as_ref().map(Poll::from_draft),
            file: self.file,
            audio: self.audio,
            location: self.location,
            status,
            client_id,
        }
    }
}

impl Message {
    pub fn system(room_id: RoomId, text: impl Into<String>) -> Self {
        Message {
            id: new_id(),
            room_id,
            author: "system".to_string(),
            timestamp: now_millis(),
            text: text.into(),
            kind: MessageKind::System,
            reactions: Vec::new(),
            poll: None,
            file: None,
            audio: None,
            location: None,
            status: MessageStatus::Sent,
            client_id: None,
        }
    }

    /// Adds the user's reaction, or removes it if already present. Empty
    /// reactions are dropped.
    pub fn toggle_reaction(&mut self, emoji: &str, user_id: &str) {
        match self.reactions.iter_mut().find(|r| r.emoji == emoji) {
            Some(reaction) => {
                if let Some(pos) = reaction.users.iter().position(|u| u == user_id) {
                    reaction.users.remove(pos);
                } else {
                    reaction.users.push(user_id.to_string());
                }
            }
            None => self.reactions.push(Reaction {
                emoji: emoji.to_string(),
                users: vec![user_id.to_string()],
            }),
        }
        self.reactions.retain(|r| !r.users.is_empty());
    }

    /// Folds a newer copy of the same message into this one. Content is taken
    /// from `other`, status never regresses.
    pub fn merge_from(&mut self, other: Message) {
        let status = self.status.max(other.status);
        *self = other;
        self.status = status;
    }
}
