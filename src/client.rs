//! WebSocket client that keeps a `ChatSession` in sync with the relay.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::messages::{ClientMessage, ServerMessage};
use crate::models::MessageDraft;
use crate::session::ChatSession;

const TICK_EVERY: Duration = Duration::from_millis(500);

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("connection closed")]
    Closed,
}

pub struct ChatClient {
    session: Arc<Mutex<ChatSession>>,
    outgoing: mpsc::UnboundedSender<ClientMessage>,
    tasks: Vec<JoinHandle<()>>,
}

impl ChatClient {
    /// Connects to `url` (the relay's `/ws` endpoint) with a bearer token.
    /// Every server event is also forwarded on the returned receiver after it
    /// has been applied to the session.
    pub async fn connect(
        url: &str,
        token: &str,
        user_id: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ServerMessage>), ClientError> {
        let (ws_stream, _) = connect_async(format!("{url}?token={token}")).await?;
        info!("Connected to {url}");
        let (mut ws_tx, mut ws_rx) = ws_stream.split();

        let session = Arc::new(Mutex::new(ChatSession::new(user_id)));
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let writer = tokio::spawn(async move {
            while let Some(event) = outgoing_rx.recv().await {
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        error!("Failed to encode client event: {e}");
                        continue;
                    }
                };
                if let Err(e) = ws_tx.send(Message::text(text)).await {
                    warn!("Failed to send WebSocket message: {e}");
                    break;
                }
            }
            let _ = ws_tx.close().await;
        });

        let reader_session = Arc::clone(&session);
        let reader_outgoing = outgoing.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = ws_rx.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!("WebSocket error: {e}");
                        break;
                    }
                };
                let event: ServerMessage = match serde_json::from_str(text.as_str()) {
                    Ok(event) => event,
                    Err(e) => {
                        debug!("Ignoring unparseable frame: {e}");
                        continue;
                    }
                };

                let acks = reader_session
                    .lock()
                    .await
                    .apply(event.clone(), Instant::now());
                for ack in acks {
                    let _ = reader_outgoing.send(ack);
                }
                let _ = events_tx.send(event);
            }
            info!("Connection to relay closed");
        });

        let ticker_session = Arc::clone(&session);
        let ticker_outgoing = outgoing.clone();
        let ticker = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TICK_EVERY);
            loop {
                ticker.tick().await;
                let events = ticker_session.lock().await.tick(Instant::now());
                for event in events {
                    if ticker_outgoing.send(event).is_err() {
                        return;
                    }
                }
            }
        });

        Ok((
            ChatClient {
                session,
                outgoing,
                tasks: vec![writer, reader, ticker],
            },
            events_rx,
        ))
    }

    pub fn session(&self) -> Arc<Mutex<ChatSession>> {
        Arc::clone(&self.session)
    }

    pub fn send(&self, event: ClientMessage) -> Result<(), ClientError> {
        self.outgoing.send(event).map_err(|_| ClientError::Closed)
    }

    fn send_all(&self, events: impl IntoIterator<Item = ClientMessage>) -> Result<(), ClientError> {
        for event in events {
            self.send(event)?;
        }
        Ok(())
    }

    /// Sends a message optimistically. Returns `false` when the draft was empty
    /// or the room is unknown.
    pub async fn send_message(&self, room_id: &str, draft: MessageDraft) -> Result<bool, ClientError> {
        let event = self
            .session
            .lock()
            .await
            .send_message(room_id, draft, Instant::now());
        match event {
            Some(event) => self.send(event).map(|()| true),
            None => Ok(false),
        }
    }

    pub async fn set_active_room(&self, room_id: &str) -> Result<(), ClientError> {
        let events = self.session.lock().await.set_active_room(room_id);
        self.send_all(events)
    }

    pub async fn keystroke(&self) -> Result<(), ClientError> {
        let event = self.session.lock().await.keystroke(Instant::now());
        self.send_all(event)
    }

    pub async fn vote(&self, room_id: &str, message_id: &str, option_id: &str) -> Result<(), ClientError> {
        let event = self.session.lock().await.vote(room_id, message_id, option_id);
        self.send_all(event)
    }

    pub async fn react(&self, room_id: &str, message_id: &str, emoji: &str) -> Result<(), ClientError> {
        let event = self.session.lock().await.react(room_id, message_id, emoji);
        self.send_all(event)
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
