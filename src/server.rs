use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;
use warp::ws::{Message, WebSocket};

use crate::auth::Auth;
use crate::error::{ChatError, Result};
use crate::files::FileManager;
use crate::messages::{ClientMessage, OutgoingMessage, ServerMessage};
use crate::models::{new_id, MessageStatus, RoomId, User, UserId, UserRecord};
use crate::room::{ActiveCall, CallKind, NewRoom, Room, RoomType};
use crate::store::{ChatStore, StoreError};
use crate::typing::TypingTracker;

struct Connection {
    user_id: UserId,
    tx: mpsc::UnboundedSender<Message>,
}

type Connections = Arc<RwLock<HashMap<String, Connection>>>;
type Typing = Arc<Mutex<HashMap<RoomId, TypingTracker>>>;
type RoomLocks = Arc<Mutex<HashMap<RoomId, Arc<Mutex<()>>>>>;

/// The relay: owns live connections and applies socket and REST operations
/// against the store, fanning results out to room members.
#[derive(Clone)]
pub struct Server {
    store: Arc<dyn ChatStore>,
    auth: Auth,
    connections: Connections,
    typing: Typing,
    room_locks: RoomLocks,
    pub files: Arc<FileManager>,
}

impl Server {
    pub fn new(store: Arc<dyn ChatStore>, auth: Auth, files: Arc<FileManager>) -> Self {
        Server {
            store,
            auth,
            connections: Arc::new(RwLock::new(HashMap::new())),
            typing: Arc::new(Mutex::new(HashMap::new())),
            room_locks: Arc::new(Mutex::new(HashMap::new())),
            files,
        }
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    // ---- accounts -------------------------------------------------------

    pub async fn signup(
        &self,
        name: &str,
        password: &str,
        profile_picture: Option<String>,
    ) -> Result<(String, User)> {
        let name = name.trim();
        if name.is_empty() || password.is_empty() {
            return Err(ChatError::InvalidInput("Name and password are required".to_string()));
        }

        let record = UserRecord {
            id: new_id(),
            name: name.to_string(),
            password_hash: self.auth.hash_password(password)?,
            profile_picture,
        };
        match self.store.create_user(record.clone()).await {
            Ok(()) => {}
            Err(StoreError::DuplicateName) => {
                return Err(ChatError::Conflict("User name already taken".to_string()))
            }
            Err(e) => return Err(e.into()),
        }
        info!("Registered user {} ({})", record.name, record.id);

        let token = self.auth.issue_token(&record.id, &record.name)?;
        let online = self.is_online(&record.id).await;
        Ok((token, record.to_user(online)))
    }

    pub async fn login(&self, name: &str, password: &str) -> Result<(String, User)> {
        let record = self
            .store
            .find_user_by_name(name.trim())
            .await?
            .ok_or(ChatError::Unauthorized)?;
        if !self.auth.verify_password(password, &record.password_hash) {
            return Err(ChatError::Unauthorized);
        }

        let token = self.auth.issue_token(&record.id, &record.name)?;
        let online = self.is_online(&record.id).await;
        Ok((token, record.to_user(online)))
    }

    /// Resolves a bearer token to a user that still exists.
    pub async fn authenticate(&self, token: &str) -> Result<UserId> {
        let claims = self.auth.verify_token(token)?;
        match self.store.get_user(&claims.sub).await? {
            Some(user) => Ok(user.id),
            None => Err(ChatError::Unauthorized),
        }
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let online = self.online_users().await;
        Ok(self
            .store
            .list_users()
            .await?
            .iter()
            .map(|record| record.to_user(online.contains(&record.id)))
            .collect())
    }

    // ---- presence -------------------------------------------------------

    pub async fn online_users(&self) -> Vec<UserId> {
        let connections = self.connections.read().await;
        let mut users: Vec<UserId> = connections
            .values()
            .map(|c| c.user_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        users.sort();
        users
    }

    pub async fn is_online(&self, user_id: &str) -> bool {
        let connections = self.connections.read().await;
        connections.values().any(|c| c.user_id == user_id)
    }

    // ---- rooms ----------------------------------------------------------

    pub async fn list_rooms(&self, user_id: &str) -> Result<Vec<Room>> {
        Ok(self
            .store
            .list_rooms_for_user(user_id)
            .await?
            .iter()
            .map(|room| room.summary_for(user_id))
            .collect())
    }

    pub async fn create_room(&self, creator: &str, mut request: NewRoom) -> Result<Room> {
        if request.name.trim().is_empty() {
            if request.kind == RoomType::SelfNotes {
                "Notes".clone_into(&mut request.name);
            } else {
                return Err(ChatError::InvalidInput("Room name is required".to_string()));
            }
        }

        let mut known = Vec::with_capacity(request.users.len());
        for user in std::mem::take(&mut request.users) {
            if self.store.get_user(&user).await?.is_some() {
                known.push(user);
            } else {
                debug!("Dropping unknown user {user} from new room");
            }
        }
        request.users = known;

        let room = Room::new(request, creator);
        self.store.create_room(&room).await?;
        info!("Room {} ({}) created by {}", room.name, room.id, creator);

        for member in &room.users {
            self.send_to_user(member, &ServerMessage::RoomCreated(room.summary_for(member)))
                .await;
        }
        Ok(room)
    }

    pub async fn delete_room(&self, user_id: &str, room_id: &str) -> Result<()> {
        let room = self.room(room_id).await?;
        if room.created_by != user_id {
            return Err(ChatError::Forbidden(
                "Only the room creator can delete it".to_string(),
            ));
        }

        self.store.delete_room(room_id).await?;
        self.typing.lock().await.remove(room_id);
        self.room_locks.lock().await.remove(room_id);
        info!("Room {room_id} deleted by {user_id}");

        let event = ServerMessage::RoomDeleted {
            room_id: room_id.to_string(),
        };
        self.broadcast_to_users(&room.users, &event, None).await;
        Ok(())
    }

    pub async fn join_room(
        &self,
        user_id: &str,
        room_id: &str,
        join_key: Option<&str>,
    ) -> Result<Room> {
        let mut room = self.room(room_id).await?;
        if !room.can_join(user_id, join_key) {
            return Err(ChatError::Forbidden("Invalid room key".to_string()));
        }

        if self.store.add_member(room_id, user_id).await? {
            room.add_member(user_id);
            if let Some(user) = self.store.get_user(user_id).await? {
                let event = ServerMessage::UserJoined {
                    room_id: room_id.to_string(),
                    user: user.to_user(true),
                };
                self.broadcast_to_users(&room.users, &event, Some(user_id)).await;
            }
        }

        let mut joined = room.summary_for(user_id);
        joined.messages = self.store.list_messages(room_id, None).await?;
        self.send_to_user(user_id, &ServerMessage::RoomJoined(joined.clone()))
            .await;
        Ok(joined)
    }

    pub async fn leave_room(&self, user_id: &str, room_id: &str) -> Result<()> {
        let room = self.room(room_id).await?;
        if room
            .active_call
            .as_ref()
            .is_some_and(|call| call.participants.iter().any(|p| p == user_id))
        {
            self.leave_call(user_id, room_id).await?;
        }

        if self.store.remove_member(room_id, user_id).await? {
            self.clear_typing(room_id, user_id, &room.users).await;
            let event = ServerMessage::UserLeft {
                room_id: room_id.to_string(),
                user_id: user_id.to_string(),
            };
            self.broadcast_to_users(&room.users, &event, None).await;
        }
        Ok(())
    }

    pub async fn history(
        &self,
        user_id: &str,
        room_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<crate::models::Message>> {
        let room = self.room(room_id).await?;
        if !room.can_read(user_id) {
            return Err(ChatError::Forbidden("Not a member of this room".to_string()));
        }
        Ok(self.store.list_messages(room_id, limit).await?)
    }

    // ---- messages -------------------------------------------------------

    /// Persists and relays a message. Empty drafts are dropped and yield `None`.
    pub async fn send_message(
        &self,
        user_id: &str,
        outgoing: OutgoingMessage,
    ) -> Result<Option<crate::models::Message>> {
        if outgoing.draft.is_empty() {
            debug!("Dropping empty message from {user_id}");
            return Ok(None);
        }
        if outgoing.draft.poll.as_ref().is_some_and(|p| !p.is_valid()) {
            return Err(ChatError::InvalidInput(
                "A poll needs a question and at least two options".to_string(),
            ));
        }

        let room = self.member_room(user_id, &outgoing.room_id).await?;
        let client_id = (!outgoing.client_id.is_empty()).then_some(outgoing.client_id);
        let message = outgoing.draft.into_message(
            new_id(),
            room.id.clone(),
            user_id.to_string(),
            MessageStatus::Sent,
            client_id,
        );
        self.store.append_message(&message).await?;

        self.clear_typing(&room.id, user_id, &room.users).await;
        self.broadcast_to_users(&room.users, &ServerMessage::ReceiveMessage(message.clone()), None)
            .await;
        Ok(Some(message))
    }

    pub async fn vote_poll(
        &self,
        user_id: &str,
        room_id: &str,
        message_id: &str,
        option_id: &str,
    ) -> Result<()> {
        let _guard = self.lock_room(room_id).await;
        let room = self.member_room(user_id, room_id).await?;
        let mut message = self.message(room_id, message_id).await?;
        let poll = message
            .poll
            .as_mut()
            .ok_or_else(|| ChatError::InvalidInput("Message has no poll".to_string()))?;
        if !poll.toggle_vote(option_id, user_id) {
            return Err(ChatError::InvalidInput("Unknown poll option".to_string()));
        }
        let poll = poll.clone();
        self.store.update_message(&message).await?;

        let event = ServerMessage::PollUpdated {
            room_id: room_id.to_string(),
            message_id: message_id.to_string(),
            poll,
        };
        self.broadcast_to_users(&room.users, &event, None).await;
        Ok(())
    }

    pub async fn react(
        &self,
        user_id: &str,
        room_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<()> {
        if emoji.trim().is_empty() {
            return Err(ChatError::InvalidInput("Reaction is empty".to_string()));
        }
        let _guard = self.lock_room(room_id).await;
        let room = self.member_room(user_id, room_id).await?;
        let mut message = self.message(room_id, message_id).await?;
        message.toggle_reaction(emoji, user_id);
        self.store.update_message(&message).await?;

        let event = ServerMessage::ReactionUpdated {
            room_id: room_id.to_string(),
            message_id: message_id.to_string(),
            reactions: message.reactions,
        };
        self.broadcast_to_users(&room.users, &event, None).await;
        Ok(())
    }

    /// Advances a message's status on behalf of a recipient. The author's own
    /// acknowledgements are ignored.
    pub async fn mark_status(
        &self,
        user_id: &str,
        room_id: &str,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<()> {
        let _guard = self.lock_room(room_id).await;
        let room = self.member_room(user_id, room_id).await?;
        let mut message = self.message(room_id, message_id).await?;
        if message.author == user_id || !message.status.advance(status) {
            return Ok(());
        }
        self.store.update_message(&message).await?;

        let event = ServerMessage::MessageStatus {
            room_id: room_id.to_string(),
            message_id: message_id.to_string(),
            status: message.status,
        };
        self.broadcast_to_users(&room.users, &event, None).await;
        Ok(())
    }

    // ---- typing ---------------------------------------------------------

    pub async fn typing(&self, user_id: &str, room_id: &str, is_typing: bool) -> Result<()> {
        let room = self.member_room(user_id, room_id).await?;
        let changed = {
            let mut typing = self.typing.lock().await;
            typing
                .entry(room_id.to_string())
                .or_default()
                .set(user_id, is_typing, Instant::now())
        };

        if changed {
            let event = ServerMessage::UserTyping {
                room_id: room_id.to_string(),
                user_id: user_id.to_string(),
                is_typing,
            };
            self.broadcast_to_users(&room.users, &event, Some(user_id)).await;
        }
        Ok(())
    }

    async fn clear_typing(&self, room_id: &str, user_id: &str, members: &[UserId]) {
        let cleared = {
            let mut typing = self.typing.lock().await;
            typing
                .get_mut(room_id)
                .is_some_and(|tracker| tracker.clear(user_id))
        };
        if cleared {
            let event = ServerMessage::UserTyping {
                room_id: room_id.to_string(),
                user_id: user_id.to_string(),
                is_typing: false,
            };
            self.broadcast_to_users(members, &event, Some(user_id)).await;
        }
    }

    /// Broadcasts a stop for every typing flag that outlived its timeout.
    pub async fn expire_typing(&self, now: Instant) {
        let expired: Vec<(RoomId, Vec<UserId>)> = {
            let mut typing = self.typing.lock().await;
            let expired: Vec<(RoomId, Vec<UserId>)> = typing
                .iter_mut()
                .map(|(room_id, tracker)| (room_id.clone(), tracker.expire(now)))
                .filter(|(_, users)| !users.is_empty())
                .collect();
            typing.retain(|_, tracker| !tracker.is_empty());
            expired
        };

        for (room_id, users) in expired {
            let members = match self.store.get_room(&room_id).await {
                Ok(Some(room)) => room.users,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Typing sweep could not load room {room_id}: {e}");
                    continue;
                }
            };
            for user_id in users {
                debug!("Typing expired for {user_id} in {room_id}");
                let event = ServerMessage::UserTyping {
                    room_id: room_id.clone(),
                    user_id: user_id.clone(),
                    is_typing: false,
                };
                self.broadcast_to_users(&members, &event, Some(&user_id)).await;
            }
        }
    }

    pub fn spawn_typing_sweeper(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let server = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                server.expire_typing(Instant::now()).await;
            }
        })
    }

    // ---- calls ----------------------------------------------------------

    pub async fn start_call(&self, user_id: &str, room_id: &str, kind: CallKind) -> Result<ActiveCall> {
        let _guard = self.lock_room(room_id).await;
        let room = self.member_room(user_id, room_id).await?;
        if room.active_call.is_some() {
            return Err(ChatError::Conflict("A call is already active".to_string()));
        }

        let call = ActiveCall::start(kind, user_id);
        self.store.set_active_call(room_id, Some(&call)).await?;
        let event = ServerMessage::CallStarted {
            room_id: room_id.to_string(),
            call: call.clone(),
        };
        self.broadcast_to_users(&room.users, &event, None).await;
        Ok(call)
    }

    pub async fn join_call(&self, user_id: &str, room_id: &str) -> Result<()> {
        let _guard = self.lock_room(room_id).await;
        let room = self.member_room(user_id, room_id).await?;
        let mut call = room
            .active_call
            .ok_or_else(|| ChatError::InvalidInput("No active call".to_string()))?;
        if call.join(user_id) {
            self.store.set_active_call(room_id, Some(&call)).await?;
            let event = ServerMessage::CallUpdated {
                room_id: room_id.to_string(),
                call,
            };
            self.broadcast_to_users(&room.users, &event, None).await;
        }
        Ok(())
    }

    pub async fn leave_call(&self, user_id: &str, room_id: &str) -> Result<()> {
        let _guard = self.lock_room(room_id).await;
        let room = self.room(room_id).await?;
        let Some(mut call) = room.active_call else {
            return Ok(());
        };
        if !call.participants.iter().any(|p| p == user_id) {
            return Ok(());
        }

        if call.leave(user_id) {
            self.end_call_unchecked(room_id, &room.users).await
        } else {
            self.store.set_active_call(room_id, Some(&call)).await?;
            let event = ServerMessage::CallUpdated {
                room_id: room_id.to_string(),
                call,
            };
            self.broadcast_to_users(&room.users, &event, None).await;
            Ok(())
        }
    }

    pub async fn end_call(&self, user_id: &str, room_id: &str) -> Result<()> {
        let _guard = self.lock_room(room_id).await;
        let room = self.member_room(user_id, room_id).await?;
        if room.active_call.is_none() {
            return Ok(());
        }
        self.end_call_unchecked(room_id, &room.users).await
    }

    async fn end_call_unchecked(&self, room_id: &str, members: &[UserId]) -> Result<()> {
        self.store.set_active_call(room_id, None).await?;
        let event = ServerMessage::CallEnded {
            room_id: room_id.to_string(),
        };
        self.broadcast_to_users(members, &event, None).await;
        Ok(())
    }

    // ---- lookups --------------------------------------------------------

    /// Serializes read-modify-write updates to one room's messages and call.
    async fn lock_room(&self, room_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.room_locks.lock().await;
            Arc::clone(locks.entry(room_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    async fn room(&self, room_id: &str) -> Result<Room> {
        self.store
            .get_room(room_id)
            .await?
            .ok_or(ChatError::NotFound("room"))
    }

    async fn member_room(&self, user_id: &str, room_id: &str) -> Result<Room> {
        let room = self.room(room_id).await?;
        if !room.is_member(user_id) {
            return Err(ChatError::Forbidden("Not a member of this room".to_string()));
        }
        Ok(room)
    }

    async fn message(&self, room_id: &str, message_id: &str) -> Result<crate::models::Message> {
        self.store
            .get_message(room_id, message_id)
            .await?
            .ok_or(ChatError::NotFound("message"))
    }

    // ---- connections ----------------------------------------------------

    pub async fn handle_connection(&self, ws: WebSocket, user_id: UserId) {
        let connection_id = Uuid::new_v4().to_string();
        let (mut ws_tx, mut ws_rx) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let first_connection = {
            let mut connections = self.connections.write().await;
            let first = !connections.values().any(|c| c.user_id == user_id);
            connections.insert(
                connection_id.clone(),
                Connection {
                    user_id: user_id.clone(),
                    tx,
                },
            );
            first
        };
        info!("Connection {connection_id} opened for {user_id}");

        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let Err(e) = ws_tx.send(message).await {
                    warn!("Failed to send WebSocket message: {e}");
                    break;
                }
            }
        });

        if first_connection {
            let event = ServerMessage::UserOnline {
                user_id: user_id.clone(),
            };
            self.broadcast_all(&event, Some(&user_id)).await;
        }
        self.send_welcome(&connection_id, &user_id).await;

        while let Some(result) = ws_rx.next().await {
            let msg = match result {
                Ok(msg) => msg,
                Err(e) => {
                    warn!("WebSocket error on {connection_id}: {e}");
                    break;
                }
            };
            if msg.is_close() {
                break;
            }
            let Ok(text) = msg.to_str() else {
                continue;
            };

            match serde_json::from_str::<ClientMessage>(text) {
                Ok(client_msg) => {
                    if let Err(e) = self.handle_client_message(&user_id, client_msg).await {
                        self.report(&connection_id, &e).await;
                    }
                }
                Err(e) => {
                    debug!("Unparseable frame from {connection_id}: {e}");
                    self.send_to_connection(
                        &connection_id,
                        &ServerMessage::error("Malformed event"),
                    )
                    .await;
                }
            }
        }

        self.handle_disconnect(&connection_id, &user_id).await;
    }

    async fn send_welcome(&self, connection_id: &str, user_id: &str) {
        let rooms = match self.list_rooms(user_id).await {
            Ok(rooms) => rooms,
            Err(e) => {
                error!("Could not load rooms for {user_id}: {e}");
                Vec::new()
            }
        };
        let event = ServerMessage::Connected {
            user_id: user_id.to_string(),
            online_users: self.online_users().await,
            rooms,
        };
        self.send_to_connection(connection_id, &event).await;
    }

    pub async fn handle_client_message(&self, user_id: &str, message: ClientMessage) -> Result<()> {
        match message {
            ClientMessage::JoinRoom { room_id, join_key } => {
                self.join_room(user_id, &room_id, join_key.as_deref()).await?;
            }
            ClientMessage::LeaveRoom { room_id } => self.leave_room(user_id, &room_id).await?,
            ClientMessage::CreateRoom(request) => {
                self.create_room(user_id, request).await?;
            }
            ClientMessage::DeleteRoom { room_id } => self.delete_room(user_id, &room_id).await?,
            ClientMessage::SendMessage(outgoing) => {
                self.send_message(user_id, outgoing).await?;
            }
            ClientMessage::Typing { room_id, is_typing } => {
                self.typing(user_id, &room_id, is_typing).await?;
            }
            ClientMessage::VotePoll {
                room_id,
                message_id,
                option_id,
            } => self.vote_poll(user_id, &room_id, &message_id, &option_id).await?,
            ClientMessage::ReactToMessage {
                room_id,
                message_id,
                emoji,
            } => self.react(user_id, &room_id, &message_id, &emoji).await?,
            ClientMessage::MessageDelivered { room_id, message_id } => {
                self.mark_status(user_id, &room_id, &message_id, MessageStatus::Delivered)
                    .await?;
            }
            ClientMessage::MessageSeen { room_id, message_id } => {
                self.mark_status(user_id, &room_id, &message_id, MessageStatus::Seen)
                    .await?;
            }
            ClientMessage::StartCall { room_id, kind } => {
                self.start_call(user_id, &room_id, kind).await?;
            }
            ClientMessage::JoinCall { room_id } => self.join_call(user_id, &room_id).await?,
            ClientMessage::LeaveCall { room_id } => self.leave_call(user_id, &room_id).await?,
            ClientMessage::EndCall { room_id } => self.end_call(user_id, &room_id).await?,
        }
        Ok(())
    }

    async fn report(&self, connection_id: &str, err: &ChatError) {
        if err.is_server_side() {
            error!("Event from {connection_id} failed: {err}");
        } else {
            debug!("Event from {connection_id} rejected: {err}");
        }
        self.send_to_connection(connection_id, &ServerMessage::error(err.public_message()))
            .await;
    }

    async fn handle_disconnect(&self, connection_id: &str, user_id: &str) {
        let last_connection = {
            let mut connections = self.connections.write().await;
            connections.remove(connection_id);
            !connections.values().any(|c| c.user_id == user_id)
        };
        info!("Connection {connection_id} closed for {user_id}");

        if !last_connection {
            return;
        }

        match self.store.list_rooms_for_user(user_id).await {
            Ok(rooms) => {
                for room in rooms.iter().filter(|r| r.is_member(user_id)) {
                    self.clear_typing(&room.id, user_id, &room.users).await;
                    if let Err(e) = self.leave_call(user_id, &room.id).await {
                        warn!("Could not drop {user_id} from call in {}: {e}", room.id);
                    }
                }
            }
            Err(e) => warn!("Could not load rooms for departing {user_id}: {e}"),
        }

        let event = ServerMessage::UserOffline {
            user_id: user_id.to_string(),
        };
        self.broadcast_all(&event, Some(user_id)).await;
    }

    async fn send_to_connection(&self, connection_id: &str, message: &ServerMessage) {
        if let Ok(msg) = serde_json::to_string(message) {
            let connections = self.connections.read().await;
            if let Some(conn) = connections.get(connection_id) {
                let _ = conn.tx.send(Message::text(msg));
            }
        }
    }

    async fn send_to_user(&self, user_id: &str, message: &ServerMessage) {
        self.broadcast_where(message, |conn| conn.user_id == user_id)
            .await;
    }

    async fn broadcast_to_users(
        &self,
        users: &[UserId],
        message: &ServerMessage,
        except_user: Option<&str>,
    ) {
        self.broadcast_where(message, |conn| {
            Some(conn.user_id.as_str()) != except_user && users.contains(&conn.user_id)
        })
        .await;
    }

    async fn broadcast_all(&self, message: &ServerMessage, except_user: Option<&str>) {
        self.broadcast_where(message, |conn| Some(conn.user_id.as_str()) != except_user)
            .await;
    }

    async fn broadcast_where<F>(&self, message: &ServerMessage, include: F)
    where
        F: Fn(&Connection) -> bool,
    {
        let msg = match serde_json::to_string(message) {
            Ok(msg) => msg,
            Err(e) => {
                error!("Failed to encode server event: {e}");
                return;
            }
        };
        let connections = self.connections.read().await;
        for conn in connections.values().filter(|c| include(c)) {
            let _ = conn.tx.send(Message::text(msg.clone()));
        }
    }
}
