//! Socket frames. Every frame is `{"event": <name>, "data": <payload>}`.

use serde::{Deserialize, Serialize};

use crate::models::{Message, MessageDraft, MessageId, MessageStatus, Poll, Reaction, RoomId, User, UserId};
use crate::room::{ActiveCall, CallKind, NewRoom, Room};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub room_id: RoomId,
    #[serde(default)]
    pub client_id: String,
    #[serde(flatten)]
    pub draft: MessageDraft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_id: RoomId,
        #[serde(default)]
        join_key: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    LeaveRoom { room_id: RoomId },
    CreateRoom(NewRoom),
    #[serde(rename_all = "camelCase")]
    DeleteRoom { room_id: RoomId },
    SendMessage(OutgoingMessage),
    #[serde(rename_all = "camelCase")]
    Typing { room_id: RoomId, is_typing: bool },
    #[serde(rename_all = "camelCase")]
    VotePoll {
        room_id: RoomId,
        message_id: MessageId,
        option_id: String,
    },
    #[serde(rename_all = "camelCase")]
    ReactToMessage {
        room_id: RoomId,
        message_id: MessageId,
        emoji: String,
    },
    #[serde(rename_all = "camelCase")]
    MessageDelivered { room_id: RoomId, message_id: MessageId },
    #[serde(rename_all = "camelCase")]
    MessageSeen { room_id: RoomId, message_id: MessageId },
    #[serde(rename_all = "camelCase")]
    StartCall { room_id: RoomId, kind: CallKind },
    #[serde(rename_all = "camelCase")]
    JoinCall { room_id: RoomId },
    #[serde(rename_all = "camelCase")]
    LeaveCall { room_id: RoomId },
    #[serde(rename_all = "camelCase")]
    EndCall { room_id: RoomId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Connected {
        user_id: UserId,
        online_users: Vec<UserId>,
        rooms: Vec<Room>,
    },
    #[serde(rename_all = "camelCase")]
    OnlineUsers { user_ids: Vec<UserId> },
    #[serde(rename_all = "camelCase")]
    UserOnline { user_id: UserId },
    #[serde(rename_all = "camelCase")]
    UserOffline { user_id: UserId },
    RoomCreated(Room),
    RoomJoined(Room),
    #[serde(rename_all = "camelCase")]
    RoomDeleted { room_id: RoomId },
    #[serde(rename_all = "camelCase")]
    UserJoined { room_id: RoomId, user: User },
    #[serde(rename_all = "camelCase")]
    UserLeft { room_id: RoomId, user_id: UserId },
    ReceiveMessage(Message),
    #[serde(rename_all = "camelCase")]
    UserTyping {
        room_id: RoomId,
        user_id: UserId,
        is_typing: bool,
    },
    #[serde(rename_all = "camelCase")]
    PollUpdated {
        room_id: RoomId,
        message_id: MessageId,
        poll: Poll,
    },
    #[serde(rename_all = "camelCase")]
    ReactionUpdated {
        room_id: RoomId,
        message_id: MessageId,
        reactions: Vec<Reaction>,
    },
    #[serde(rename_all = "camelCase")]
    MessageStatus {
        room_id: RoomId,
        message_id: MessageId,
        status: MessageStatus,
    },
    #[serde(rename_all = "camelCase")]
    CallStarted { room_id: RoomId, call: ActiveCall },
    #[serde(rename_all = "camelCase")]
    CallUpdated { room_id: RoomId, call: ActiveCall },
    #[serde(rename_all = "camelCase")]
    CallEnded { room_id: RoomId },
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}
