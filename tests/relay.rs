use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

use room_chat::api;
use room_chat::auth::Auth;
use room_chat::client::ChatClient;
use room_chat::files::FileManager;
use room_chat::messages::{ClientMessage, ServerMessage};
use room_chat::models::{new_id, MessageDraft, MessageStatus, PollDraft};
use room_chat::room::NewRoom;
use room_chat::server::Server;
use room_chat::store::MemoryStore;

const TEST_COST: u32 = 4;

async fn start() -> (String, Arc<Server>) {
    let dir = std::env::temp_dir().join(format!("room_chat_relay_{}", new_id()));
    let files = FileManager::new(dir, Duration::from_secs(60)).await.unwrap();
    let server = Arc::new(Server::new(
        Arc::new(MemoryStore::new()),
        Auth::new("relay-test").with_cost(TEST_COST),
        Arc::new(files),
    ));

    let routes = api::routes(server.clone(), PathBuf::from("public"));
    let (addr, serving) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(serving);
    (format!("ws://{addr}/ws"), server)
}

async fn wait_for<F>(rx: &mut UnboundedReceiver<ServerMessage>, mut matches: F) -> ServerMessage
where
    F: FnMut(&ServerMessage) -> bool,
{
    timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("connection closed");
            if matches(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test]
async fn messages_flow_between_clients() {
    let (url, server) = start().await;
    let (alice_token, alice) = server.signup("alice", "pw", None).await.unwrap();
    let (bob_token, bob) = server.signup("bob", "pw", None).await.unwrap();

    let (alice_client, mut alice_rx) = ChatClient::connect(&url, &alice_token, &alice.id)
        .await
        .unwrap();
    wait_for(&mut alice_rx, |e| matches!(e, ServerMessage::Connected { .. })).await;

    let (bob_client, mut bob_rx) = ChatClient::connect(&url, &bob_token, &bob.id).await.unwrap();
    wait_for(&mut bob_rx, |e| matches!(e, ServerMessage::Connected { .. })).await;
    wait_for(&mut alice_rx, |e| {
        matches!(e, ServerMessage::UserOnline { user_id } if *user_id == bob.id)
    })
    .await;

    alice_client
        .send(ClientMessage::CreateRoom(NewRoom {
            name: "General".into(),
            users: vec![bob.id.clone()],
            ..NewRoom::default()
        }))
        .unwrap();
    let ServerMessage::RoomCreated(room) =
        wait_for(&mut alice_rx, |e| matches!(e, ServerMessage::RoomCreated(_))).await
    else {
        unreachable!()
    };
    wait_for(&mut bob_rx, |e| matches!(e, ServerMessage::RoomCreated(_))).await;

    assert!(alice_client
        .send_message(&room.id, MessageDraft::text("hello bob"))
        .await
        .unwrap());
    assert!(!alice_client
        .send_message(&room.id, MessageDraft::text("   "))
        .await
        .unwrap());

    let ServerMessage::ReceiveMessage(received) =
        wait_for(&mut bob_rx, |e| matches!(e, ServerMessage::ReceiveMessage(_))).await
    else {
        unreachable!()
    };
    assert_eq!(received.text, "hello bob");
    assert_eq!(received.author, alice.id);

    // Bob is not looking at the room, so his client acknowledges delivery.
    wait_for(&mut alice_rx, |e| {
        matches!(e, ServerMessage::MessageStatus { status: MessageStatus::Delivered, .. })
    })
    .await;

    let session = alice_client.session();
    let session = session.lock().await;
    let messages = session.messages(&room.id);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, received.id);
    assert_eq!(messages[0].status, MessageStatus::Delivered);
    drop(bob_client);
}

#[tokio::test]
async fn polls_and_typing_are_relayed() {
    let (url, server) = start().await;
    let (alice_token, alice) = server.signup("alice", "pw", None).await.unwrap();
    let (bob_token, bob) = server.signup("bob", "pw", None).await.unwrap();
    let room = server
        .create_room(
            &alice.id,
            NewRoom {
                name: "Lunch".into(),
                users: vec![bob.id.clone()],
                ..NewRoom::default()
            },
        )
        .await
        .unwrap();

    let (alice_client, mut alice_rx) = ChatClient::connect(&url, &alice_token, &alice.id)
        .await
        .unwrap();
    wait_for(&mut alice_rx, |e| matches!(e, ServerMessage::Connected { .. })).await;
    let (bob_client, mut bob_rx) = ChatClient::connect(&url, &bob_token, &bob.id).await.unwrap();
    wait_for(&mut bob_rx, |e| matches!(e, ServerMessage::Connected { .. })).await;

    bob_client.set_active_room(&room.id).await.unwrap();
    wait_for(&mut bob_rx, |e| matches!(e, ServerMessage::RoomJoined(_))).await;

    alice_client.set_active_room(&room.id).await.unwrap();
    wait_for(&mut alice_rx, |e| matches!(e, ServerMessage::RoomJoined(_))).await;
    alice_client.keystroke().await.unwrap();
    wait_for(&mut bob_rx, |e| {
        matches!(e, ServerMessage::UserTyping { is_typing: true, .. })
    })
    .await;

    let draft = MessageDraft {
        poll: Some(PollDraft {
            question: "Where?".into(),
            options: vec!["Tacos".into(), "Ramen".into()],
        }),
        ..MessageDraft::default()
    };
    alice_client.send_message(&room.id, draft).await.unwrap();
    wait_for(&mut bob_rx, |e| {
        matches!(e, ServerMessage::UserTyping { is_typing: false, .. })
    })
    .await;
    let ServerMessage::ReceiveMessage(poll_msg) =
        wait_for(&mut bob_rx, |e| matches!(e, ServerMessage::ReceiveMessage(_))).await
    else {
        unreachable!()
    };

    // Bob had the room open, so the poll was marked seen.
    wait_for(&mut alice_rx, |e| {
        matches!(e, ServerMessage::MessageStatus { status: MessageStatus::Seen, .. })
    })
    .await;

    bob_client.vote(&room.id, &poll_msg.id, "opt-1").await.unwrap();
    let ServerMessage::PollUpdated { poll, .. } =
        wait_for(&mut alice_rx, |e| matches!(e, ServerMessage::PollUpdated { .. })).await
    else {
        unreachable!()
    };
    assert_eq!(poll.vote_of(&bob.id), Some("opt-1"));
}

#[tokio::test]
async fn bad_token_is_refused() {
    let (url, _server) = start().await;
    assert!(ChatClient::connect(&url, "nope", "nobody").await.is_err());
}

#[tokio::test]
async fn user_goes_offline_with_last_connection() {
    let (url, server) = start().await;
    let (alice_token, alice) = server.signup("alice", "pw", None).await.unwrap();
    let (bob_token, bob) = server.signup("bob", "pw", None).await.unwrap();

    let (_alice_client, mut alice_rx) = ChatClient::connect(&url, &alice_token, &alice.id)
        .await
        .unwrap();
    wait_for(&mut alice_rx, |e| matches!(e, ServerMessage::Connected { .. })).await;

    let (phone, mut phone_rx) = ChatClient::connect(&url, &bob_token, &bob.id).await.unwrap();
    wait_for(&mut phone_rx, |e| matches!(e, ServerMessage::Connected { .. })).await;
    let (laptop, mut laptop_rx) = ChatClient::connect(&url, &bob_token, &bob.id).await.unwrap();
    wait_for(&mut laptop_rx, |e| matches!(e, ServerMessage::Connected { .. })).await;

    drop(phone);
    tokio::time::sleep(Duration::from_millis(300)).await;
    while let Ok(event) = alice_rx.try_recv() {
        assert!(!matches!(event, ServerMessage::UserOffline { .. }));
    }
    assert!(server.is_online(&bob.id).await);

    drop(laptop);
    wait_for(&mut alice_rx, |e| {
        matches!(e, ServerMessage::UserOffline { user_id } if *user_id == bob.id)
    })
    .await;
    assert!(!server.is_online(&bob.id).await);
}
