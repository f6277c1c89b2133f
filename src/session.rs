//! Client-side chat state.
//!
//! `ChatSession` is what a front end renders from. It folds server events
//! into local state, applies the user's own actions optimistically, and hands
//! back the socket events those actions (and some server events) require.
//! Nothing here does I/O; callers pass `now` so timers are deterministic.

use std::collections::HashSet;
use std::time::Instant;

use log::debug;

use crate::messages::{ClientMessage, OutgoingMessage, ServerMessage};
use crate::models::{new_id, Message, MessageDraft, MessageStatus, RoomId, UserId};
use crate::room::{NewRoom, Room};
use crate::typing::{LocalTyping, TypingTracker};

#[derive(Debug)]
struct RoomState {
    room: Room,
    typing: TypingTracker,
}

impl RoomState {
    fn new(room: Room) -> Self {
        RoomState {
            room,
            typing: TypingTracker::default(),
        }
    }

    fn message_mut(&mut self, message_id: &str) -> Option<&mut Message> {
        self.room.messages.iter_mut().find(|m| m.id == message_id)
    }
}

#[derive(Debug)]
pub struct ChatSession {
    user_id: UserId,
    rooms: Vec<RoomState>,
    active_room: Option<RoomId>,
    online: HashSet<UserId>,
    local_typing: LocalTyping,
    typing_room: Option<RoomId>,
    last_error: Option<String>,
}

impl ChatSession {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        ChatSession {
            user_id: user_id.into(),
            rooms: Vec::new(),
            active_room: None,
            online: HashSet::new(),
            local_typing: LocalTyping::default(),
            typing_room: None,
            last_error: None,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.iter().map(|state| &state.room)
    }

    pub fn room(&self, room_id: &str) -> Option<&Room> {
        self.state(room_id).map(|state| &state.room)
    }

    pub fn messages(&self, room_id: &str) -> &[Message] {
        self.room(room_id).map_or(&[], |room| room.messages.as_slice())
    }

    pub fn active_room(&self) -> Option<&Room> {
        self.active_room.as_deref().and_then(|id| self.room(id))
    }

    pub fn online_users(&self) -> Vec<UserId> {
        let mut users: Vec<_> = self.online.iter().cloned().collect();
        users.sort();
        users
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.online.contains(user_id)
    }

    pub fn typing_users(&self, room_id: &str) -> Vec<UserId> {
        self.state(room_id)
            .map(|state| state.typing.users())
            .unwrap_or_default()
    }

    pub fn is_typing(&self) -> bool {
        self.local_typing.is_typing()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn state(&self, room_id: &str) -> Option<&RoomState> {
        self.rooms.iter().find(|state| state.room.id == room_id)
    }

    fn state_mut(&mut self, room_id: &str) -> Option<&mut RoomState> {
        self.rooms.iter_mut().find(|state| state.room.id == room_id)
    }

    // ---- server events --------------------------------------------------

    /// Folds one server event into local state. Returns acknowledgements the
    /// caller should send back.
    pub fn apply(&mut self, event: ServerMessage, now: Instant) -> Vec<ClientMessage> {
        match event {
            ServerMessage::Connected {
                user_id,
                online_users,
                rooms,
            } => {
                self.user_id = user_id;
                self.online = online_users.into_iter().collect();
                let mut acks = Vec::new();
                for room in rooms {
                    acks.extend(self.upsert_room(room));
                }
                acks
            }
            ServerMessage::OnlineUsers { user_ids } => {
                self.online = user_ids.into_iter().collect();
                Vec::new()
            }
            ServerMessage::UserOnline { user_id } => {
                self.online.insert(user_id);
                Vec::new()
            }
            ServerMessage::UserOffline { user_id } => {
                self.online.remove(&user_id);
                for state in &mut self.rooms {
                    state.typing.clear(&user_id);
                }
                Vec::new()
            }
            ServerMessage::RoomCreated(room) | ServerMessage::RoomJoined(room) => {
                self.upsert_room(room)
            }
            ServerMessage::RoomDeleted { room_id } => {
                self.remove_room(&room_id);
                Vec::new()
            }
            ServerMessage::UserJoined { room_id, user } => {
                if user.is_online {
                    self.online.insert(user.id.clone());
                }
                if let Some(state) = self.state_mut(&room_id) {
                    state.room.add_member(&user.id);
                }
                Vec::new()
            }
            ServerMessage::UserLeft { room_id, user_id } => {
                if user_id == self.user_id {
                    self.remove_room(&room_id);
                } else if let Some(state) = self.state_mut(&room_id) {
                    state.room.remove_member(&user_id);
                    state.typing.clear(&user_id);
                }
                Vec::new()
            }
            ServerMessage::ReceiveMessage(message) => self.receive(message),
            ServerMessage::UserTyping {
                room_id,
                user_id,
                is_typing,
            } => {
                if user_id != self.user_id {
                    if let Some(state) = self.state_mut(&room_id) {
                        state.typing.set(&user_id, is_typing, now);
                    }
                }
                Vec::new()
            }
            ServerMessage::PollUpdated {
                room_id,
                message_id,
                poll,
            } => {
                if let Some(message) = self
                    .state_mut(&room_id)
                    .and_then(|state| state.message_mut(&message_id))
                {
                    message.poll = Some(poll);
                }
                Vec::new()
            }
            ServerMessage::ReactionUpdated {
                room_id,
                message_id,
                reactions,
            } => {
                if let Some(message) = self
                    .state_mut(&room_id)
                    .and_then(|state| state.message_mut(&message_id))
                {
                    message.reactions = reactions;
                }
                Vec::new()
            }
            ServerMessage::MessageStatus {
                room_id,
                message_id,
                status,
            } => {
                if let Some(message) = self
                    .state_mut(&room_id)
                    .and_then(|state| state.message_mut(&message_id))
                {
                    message.status.advance(status);
                }
                Vec::new()
            }
            ServerMessage::CallStarted { room_id, call }
            | ServerMessage::CallUpdated { room_id, call } => {
                if let Some(state) = self.state_mut(&room_id) {
                    state.room.active_call = Some(call);
                }
                Vec::new()
            }
            ServerMessage::CallEnded { room_id } => {
                if let Some(state) = self.state_mut(&room_id) {
                    state.room.active_call = None;
                }
                Vec::new()
            }
            ServerMessage::Error { message } => {
                debug!("Server reported: {message}");
                self.last_error = Some(message);
                Vec::new()
            }
        }
    }

    /// Inserts or refreshes a room. Incoming history wins for messages it
    /// contains; local messages it lacks (pending sends, live arrivals) are
    /// kept after it.
    fn upsert_room(&mut self, mut incoming: Room) -> Vec<ClientMessage> {
        let room_id = incoming.id.clone();
        match self.state_mut(&room_id) {
            Some(state) => {
                for local in std::mem::take(&mut state.room.messages) {
                    match incoming.messages.iter_mut().find(|m| same_message(m, &local)) {
                        Some(fresh) => {
                            fresh.status.advance(local.status);
                        }
                        None => incoming.messages.push(local),
                    }
                }
                state.room = incoming;
            }
            None => self.rooms.push(RoomState::new(incoming)),
        }

        if self.active_room.as_deref() == Some(room_id.as_str()) {
            self.seen_acks(&room_id)
        } else {
            Vec::new()
        }
    }

    fn remove_room(&mut self, room_id: &str) {
        self.rooms.retain(|state| state.room.id != room_id);
        if self.active_room.as_deref() == Some(room_id) {
            self.active_room = None;
        }
        if self.typing_room.as_deref() == Some(room_id) {
            self.typing_room = None;
            self.local_typing.stop();
        }
    }

    /// Reconciles an echoed or foreign message with local state and returns
    /// the acknowledgement it calls for, if any.
    fn receive(&mut self, message: Message) -> Vec<ClientMessage> {
        let is_active = self.active_room.as_deref() == Some(message.room_id.as_str());
        let me = self.user_id.clone();
        let Some(state) = self.state_mut(&message.room_id) else {
            debug!("Message {} for unknown room {}", message.id, message.room_id);
            return Vec::new();
        };

        state.typing.clear(&message.author);
        let room_id = message.room_id.clone();
        let message_id = message.id.clone();
        let from_other = message.author != me;

        let status = match state.room.messages.iter_mut().find(|m| same_message(m, &message)) {
            Some(existing) => {
                existing.merge_from(message);
                existing.status
            }
            None => {
                let status = message.status;
                state.room.messages.push(message);
                status
            }
        };

        if !from_other {
            return Vec::new();
        }

        let target = if is_active {
            MessageStatus::Seen
        } else {
            MessageStatus::Delivered
        };
        if status >= target {
            return Vec::new();
        }
        if let Some(stored) = state.message_mut(&message_id) {
            stored.status = target;
        }

        vec![if is_active {
            ClientMessage::MessageSeen {
                room_id,
                message_id,
            }
        } else {
            ClientMessage::MessageDelivered {
                room_id,
                message_id,
            }
        }]
    }

    /// Marks every unseen message from others in the room as seen and returns
    /// the matching events.
    fn seen_acks(&mut self, room_id: &str) -> Vec<ClientMessage> {
        let me = self.user_id.clone();
        let Some(state) = self.state_mut(room_id) else {
            return Vec::new();
        };

        state
            .room
            .messages
            .iter_mut()
            .filter(|m| m.author != me && m.status < MessageStatus::Seen)
            .map(|m| {
                m.status = MessageStatus::Seen;
                ClientMessage::MessageSeen {
                    room_id: room_id.to_string(),
                    message_id: m.id.clone(),
                }
            })
            .collect()
    }

    // ---- local actions --------------------------------------------------

    /// Switches rooms. Emits a typing stop for the room being left, a join for
    /// the new one, and seen acknowledgements for what is now on screen.
    pub fn set_active_room(&mut self, room_id: &str) -> Vec<ClientMessage> {
        let Some(join_key) = self.room(room_id).map(|room| room.join_key.clone()) else {
            return Vec::new();
        };

        let mut events = Vec::new();
        if self.typing_room.as_deref() != Some(room_id) {
            events.extend(self.blur());
        }
        self.active_room = Some(room_id.to_string());
        events.push(ClientMessage::JoinRoom {
            room_id: room_id.to_string(),
            join_key,
        });
        events.extend(self.seen_acks(room_id));
        events
    }

    /// Appends an optimistic message and returns the event that sends it.
    /// Drafts with nothing in them are ignored.
    pub fn send_message(
        &mut self,
        room_id: &str,
        draft: MessageDraft,
        now: Instant,
    ) -> Option<ClientMessage> {
        if draft.is_empty() {
            return None;
        }
        if draft.poll.as_ref().is_some_and(|poll| !poll.is_valid()) {
            return None;
        }

        let me = self.user_id.clone();
        let state = self.state_mut(room_id)?;
        let client_id = new_id();
        let optimistic = draft.clone().into_message(
            client_id.clone(),
            room_id.to_string(),
            me,
            MessageStatus::Sending,
            Some(client_id.clone()),
        );
        state.room.messages.push(optimistic);

        // The server clears our typing flag when the message lands.
        if self.typing_room.as_deref() == Some(room_id) {
            self.local_typing.stop();
            self.typing_room = None;
        }
        debug!("Queued message {client_id} at {now:?}");

        Some(ClientMessage::SendMessage(OutgoingMessage {
            room_id: room_id.to_string(),
            client_id,
            draft,
        }))
    }

    /// Records a keystroke in the active room. Only the first keystroke of a
    /// burst produces an event.
    pub fn keystroke(&mut self, now: Instant) -> Option<ClientMessage> {
        let room_id = self.active_room.clone()?;
        if self.typing_room.as_deref() != Some(room_id.as_str()) {
            self.local_typing.stop();
        }
        self.typing_room = Some(room_id.clone());
        self.local_typing
            .keystroke(now)
            .then_some(ClientMessage::Typing {
                room_id,
                is_typing: true,
            })
    }

    /// Input lost focus.
    pub fn blur(&mut self) -> Option<ClientMessage> {
        let room_id = self.typing_room.take()?;
        self.local_typing.stop().then_some(ClientMessage::Typing {
            room_id,
            is_typing: false,
        })
    }

    /// Advances timers: ends local typing after the idle period and drops
    /// remote typing flags past their timeout.
    pub fn tick(&mut self, now: Instant) -> Vec<ClientMessage> {
        for state in &mut self.rooms {
            state.typing.expire(now);
        }

        if self.local_typing.tick(now) {
            if let Some(room_id) = self.typing_room.take() {
                return vec![ClientMessage::Typing {
                    room_id,
                    is_typing: false,
                }];
            }
        }
        Vec::new()
    }

    /// Toggles the user's vote locally and returns the event to send.
    pub fn vote(&mut self, room_id: &str, message_id: &str, option_id: &str) -> Option<ClientMessage> {
        let me = self.user_id.clone();
        let poll = self
            .state_mut(room_id)?
            .message_mut(message_id)?
            .poll
            .as_mut()?;
        if !poll.toggle_vote(option_id, &me) {
            return None;
        }
        Some(ClientMessage::VotePoll {
            room_id: room_id.to_string(),
            message_id: message_id.to_string(),
            option_id: option_id.to_string(),
        })
    }

    /// Toggles the user's reaction locally and returns the event to send.
    pub fn react(&mut self, room_id: &str, message_id: &str, emoji: &str) -> Option<ClientMessage> {
        if emoji.trim().is_empty() {
            return None;
        }
        let me = self.user_id.clone();
        self.state_mut(room_id)?
            .message_mut(message_id)?
            .toggle_reaction(emoji, &me);
        Some(ClientMessage::ReactToMessage {
            room_id: room_id.to_string(),
            message_id: message_id.to_string(),
            emoji: emoji.to_string(),
        })
    }

    pub fn create_room(&self, request: NewRoom) -> ClientMessage {
        ClientMessage::CreateRoom(request)
    }

    /// Only the creator may delete; anything else would be rejected anyway.
    pub fn delete_room(&self, room_id: &str) -> Option<ClientMessage> {
        let room = self.room(room_id)?;
        (room.created_by == self.user_id).then(|| ClientMessage::DeleteRoom {
            room_id: room_id.to_string(),
        })
    }

    /// Messages still waiting for their server echo.
    pub fn pending(&self, room_id: &str) -> Vec<&Message> {
        self.messages(room_id)
            .iter()
            .filter(|m| m.status == MessageStatus::Sending)
            .collect()
    }
}

/// An echo matches the optimistic copy by author and client id; anything
/// else matches by server id.
fn same_message(a: &Message, b: &Message) -> bool {
    if a.id == b.id {
        return true;
    }
    match (&a.client_id, &b.client_id) {
        (Some(x), Some(y)) => x == y && a.author == b.author,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::{PollDraft, User};
    use crate::room::{ActiveCall, CallKind, Privacy, RoomType};
    use crate::typing::{TYPING_IDLE, TYPING_TIMEOUT};

    fn room(id: &str, users: &[&str]) -> Room {
        Room {
            id: id.to_string(),
            name: "Room".to_string(),
            kind: RoomType::Group,
            users: users.iter().map(ToString::to_string).collect(),
            messages: Vec::new(),
            privacy: Privacy::Public,
            active_call: None,
            created_by: users[0].to_string(),
            created_at: 0,
            join_key: None,
        }
    }

    fn session() -> ChatSession {
        let mut session = ChatSession::new("alice");
        session.apply(
            ServerMessage::Connected {
                user_id: "alice".into(),
                online_users: vec!["alice".into(), "bob".into()],
                rooms: vec![room("r1", &["alice", "bob"]), room("r2", &["bob", "alice"])],
            },
            Instant::now(),
        );
        session
    }

    fn from_bob(room_id: &str, id: &str, text: &str) -> Message {
        MessageDraft::text(text).into_message(
            id.into(),
            room_id.into(),
            "bob".into(),
            MessageStatus::Sent,
            Some(format!("bob-{id}")),
        )
    }

    fn echo_of(event: &ClientMessage, id: &str) -> Message {
        let ClientMessage::SendMessage(out) = event else {
            panic!("expected send_message");
        };
        out.draft.clone().into_message(
            id.into(),
            out.room_id.clone(),
            "alice".into(),
            MessageStatus::Sent,
            Some(out.client_id.clone()),
        )
    }

    #[test]
    fn empty_send_is_a_no_op() {
        let mut session = session();
        assert!(session
            .send_message("r1", MessageDraft::text("  \n "), Instant::now())
            .is_none());
        assert!(session.messages("r1").is_empty());
    }

    #[test]
    fn send_to_unknown_room_is_ignored() {
        let mut session = session();
        assert!(session
            .send_message("nope", MessageDraft::text("hi"), Instant::now())
            .is_none());
    }

    #[test]
    fn optimistic_message_is_replaced_in_place_by_echo() {
        let mut session = session();
        let now = Instant::now();
        let first = session
            .send_message("r1", MessageDraft::text("one"), now)
            .unwrap();
        session
            .send_message("r1", MessageDraft::text("two"), now)
            .unwrap();
        assert_eq!(session.pending("r1").len(), 2);

        let acks = session.apply(ServerMessage::ReceiveMessage(echo_of(&first, "srv-1")), now);
        assert!(acks.is_empty());

        let messages = session.messages("r1");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "srv-1");
        assert_eq!(messages[0].status, MessageStatus::Sent);
        assert_eq!(messages[1].text, "two");
        assert_eq!(session.pending("r1").len(), 1);

        // A repeated echo is merged, not duplicated.
        session.apply(ServerMessage::ReceiveMessage(echo_of(&first, "srv-1")), now);
        assert_eq!(session.messages("r1").len(), 2);
    }

    #[test]
    fn echo_does_not_regress_status() {
        let mut session = session();
        let now = Instant::now();
        let send = session
            .send_message("r1", MessageDraft::text("hi"), now)
            .unwrap();
        session.apply(ServerMessage::ReceiveMessage(echo_of(&send, "srv-1")), now);
        session.apply(
            ServerMessage::MessageStatus {
                room_id: "r1".into(),
                message_id: "srv-1".into(),
                status: MessageStatus::Seen,
            },
            now,
        );
        session.apply(ServerMessage::ReceiveMessage(echo_of(&send, "srv-1")), now);
        assert_eq!(session.messages("r1")[0].status, MessageStatus::Seen);
    }

    #[test]
    fn incoming_messages_are_acknowledged() {
        let mut session = session();
        let now = Instant::now();
        session.set_active_room("r1");

        let acks = session.apply(ServerMessage::ReceiveMessage(from_bob("r1", "m1", "hey")), now);
        assert_eq!(
            acks,
            vec![ClientMessage::MessageSeen {
                room_id: "r1".into(),
                message_id: "m1".into()
            }]
        );

        let acks = session.apply(ServerMessage::ReceiveMessage(from_bob("r2", "m2", "yo")), now);
        assert_eq!(
            acks,
            vec![ClientMessage::MessageDelivered {
                room_id: "r2".into(),
                message_id: "m2".into()
            }]
        );

        // Opening the room upgrades delivered to seen.
        let events = session.set_active_room("r2");
        assert!(events.contains(&ClientMessage::MessageSeen {
            room_id: "r2".into(),
            message_id: "m2".into()
        }));
        assert!(events.contains(&ClientMessage::JoinRoom {
            room_id: "r2".into(),
            join_key: None
        }));
        assert_eq!(session.active_room().unwrap().id, "r2");
    }

    #[test]
    fn keystrokes_debounce_and_expire() {
        let mut session = session();
        let t0 = Instant::now();
        assert!(session.keystroke(t0).is_none(), "no active room yet");

        session.set_active_room("r1");
        assert_eq!(
            session.keystroke(t0),
            Some(ClientMessage::Typing {
                room_id: "r1".into(),
                is_typing: true
            })
        );
        assert!(session.keystroke(t0 + Duration::from_millis(300)).is_none());
        assert!(session.tick(t0 + Duration::from_secs(1)).is_empty());
        assert_eq!(
            session.tick(t0 + Duration::from_millis(300) + TYPING_IDLE),
            vec![ClientMessage::Typing {
                room_id: "r1".into(),
                is_typing: false
            }]
        );
        assert!(!session.is_typing());
    }

    #[test]
    fn sending_and_blur_clear_typing() {
        let mut session = session();
        let t0 = Instant::now();
        session.set_active_room("r1");
        session.keystroke(t0);
        session.send_message("r1", MessageDraft::text("done"), t0);
        assert!(!session.is_typing());
        assert!(session.blur().is_none());

        session.keystroke(t0);
        assert_eq!(
            session.blur(),
            Some(ClientMessage::Typing {
                room_id: "r1".into(),
                is_typing: false
            })
        );
    }

    #[test]
    fn remote_typing_expires_and_clears_on_message() {
        let mut session = session();
        let t0 = Instant::now();
        let typing = |user: &str, on: bool| ServerMessage::UserTyping {
            room_id: "r1".into(),
            user_id: user.into(),
            is_typing: on,
        };

        session.apply(typing("bob", true), t0);
        session.apply(typing("alice", true), t0);
        assert_eq!(session.typing_users("r1"), vec!["bob"]);

        session.apply(ServerMessage::ReceiveMessage(from_bob("r1", "m1", "hi")), t0);
        assert!(session.typing_users("r1").is_empty());

        session.apply(typing("bob", true), t0);
        session.tick(t0 + TYPING_TIMEOUT);
        assert!(session.typing_users("r1").is_empty());
    }

    #[test]
    fn poll_vote_is_optimistic_and_echo_wins() {
        let mut session = session();
        let now = Instant::now();
        let mut msg = from_bob("r1", "p1", "");
        msg.poll = Some(crate::models::Poll::from_draft(&PollDraft {
            question: "Tea?".into(),
            options: vec!["Yes".into(), "No".into()],
        }));
        session.apply(ServerMessage::ReceiveMessage(msg), now);

        assert!(session.vote("r1", "p1", "opt-0").is_some());
        let poll = session.messages("r1")[0].poll.clone().unwrap();
        assert_eq!(poll.vote_of("alice"), Some("opt-0"));

        assert!(session.vote("r1", "p1", "opt-0").is_some());
        assert_eq!(session.messages("r1")[0].poll.as_ref().unwrap().vote_of("alice"), None);
        assert!(session.vote("r1", "p1", "opt-5").is_none());

        let mut server_poll = poll;
        server_poll.toggle_vote("opt-1", "bob");
        session.apply(
            ServerMessage::PollUpdated {
                room_id: "r1".into(),
                message_id: "p1".into(),
                poll: server_poll.clone(),
            },
            now,
        );
        assert_eq!(session.messages("r1")[0].poll.as_ref(), Some(&server_poll));
    }

    #[test]
    fn reactions_toggle_locally() {
        let mut session = session();
        let now = Instant::now();
        session.apply(ServerMessage::ReceiveMessage(from_bob("r1", "m1", "hi")), now);

        session.react("r1", "m1", "❤️").unwrap();
        assert_eq!(session.messages("r1")[0].reactions[0].users, vec!["alice"]);
        session.react("r1", "m1", "❤️").unwrap();
        assert!(session.messages("r1")[0].reactions.is_empty());
        assert!(session.react("r1", "m1", " ").is_none());
    }

    #[test]
    fn presence_and_room_lifecycle() {
        let mut session = session();
        let now = Instant::now();
        assert!(session.is_online("bob"));

        session.apply(ServerMessage::UserOffline { user_id: "bob".into() }, now);
        assert!(!session.is_online("bob"));
        session.apply(
            ServerMessage::UserJoined {
                room_id: "r1".into(),
                user: User {
                    id: "carol".into(),
                    name: "carol".into(),
                    is_online: true,
                    profile_picture: None,
                },
            },
            now,
        );
        assert!(session.is_online("carol"));
        assert!(session.room("r1").unwrap().is_member("carol"));

        session.set_active_room("r1");
        session.apply(ServerMessage::RoomDeleted { room_id: "r1".into() }, now);
        assert!(session.room("r1").is_none());
        assert!(session.active_room().is_none());

        session.apply(
            ServerMessage::UserLeft {
                room_id: "r2".into(),
                user_id: "alice".into(),
            },
            now,
        );
        assert_eq!(session.rooms().count(), 0);
    }

    #[test]
    fn joined_history_keeps_pending_sends() {
        let mut session = session();
        let now = Instant::now();
        session.send_message("r1", MessageDraft::text("mine"), now);

        let mut snapshot = room("r1", &["alice", "bob"]);
        snapshot.messages = vec![from_bob("r1", "m0", "earlier")];
        session.apply(ServerMessage::RoomJoined(snapshot), now);

        let texts: Vec<_> = session.messages("r1").iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["earlier", "mine"]);
    }

    #[test]
    fn calls_follow_server_events() {
        let mut session = session();
        let now = Instant::now();
        let call = ActiveCall::start(CallKind::Audio, "bob");
        session.apply(
            ServerMessage::CallStarted {
                room_id: "r1".into(),
                call: call.clone(),
            },
            now,
        );
        assert_eq!(session.room("r1").unwrap().active_call.as_ref(), Some(&call));
        session.apply(ServerMessage::CallEnded { room_id: "r1".into() }, now);
        assert!(session.room("r1").unwrap().active_call.is_none());
    }

    #[test]
    fn only_creator_may_delete() {
        let session = session();
        assert!(session.delete_room("r1").is_some());
        assert!(session.delete_room("r2").is_none());
    }

    #[test]
    fn errors_are_recorded() {
        let mut session = session();
        session.apply(ServerMessage::error("Not a member of this room"), Instant::now());
        assert_eq!(session.last_error(), Some("Not a member of this room"));
    }
}
