//! End-to-end tests: a bound hub instance driven over real sockets.

#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use lumen_hub::actions::ActionDispatcher;
use lumen_hub::app_state::AppState;
use lumen_hub::build_app;
use lumen_hub::bus::{Bus, PubSub};
use lumen_hub::domain::{ActionTag, Envelope, Lamp, Node, NodeId, User, UserId};
use lumen_hub::store::Store;
use lumen_hub::store::memory::MemoryStore;
use lumen_hub::ws::ConnectionRegistry;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

const DEADLINE: Duration = Duration::from_secs(3);

/// Node 1 (token `node-token`, lamp 1 on pin 16) owned by user 10
/// (token `user-token`).
async fn seed(store: &MemoryStore) {
    store
        .insert_node(
            Node {
                id: NodeId::new(1),
                url: None,
                is_active: true,
                is_online: false,
            },
            Some("node-token"),
        )
        .await;
    store
        .insert_user(
            User {
                id: UserId::new(10),
                email: "owner@example.com".to_string(),
            },
            Some("user-token"),
        )
        .await;
    store.link_owner(NodeId::new(1), UserId::new(10)).await;
    store
        .insert_lamp(Lamp {
            id: 1,
            node_id: NodeId::new(1),
            node_lamp_id: 16,
            name: "Pin 16".to_string(),
            value: 0,
            updated: Utc::now(),
        })
        .await;
}

async fn spawn_hub() -> (SocketAddr, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    seed(&store).await;

    let bus = Bus::new(PubSub::new(256), Duration::from_millis(20));
    let Ok(()) = bus.connect().await else {
        panic!("bus connect failed");
    };

    let dispatcher = Arc::new(ActionDispatcher::new(
        Arc::clone(&store) as Arc<dyn Store>,
        bus.clone(),
    ));
    let state = AppState {
        store: Arc::clone(&store) as Arc<dyn Store>,
        bus,
        registry: Arc::new(ConnectionRegistry::new()),
        dispatcher,
    };

    let app = build_app(state);
    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("local_addr failed");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (addr, store)
}

async fn connect_ws(addr: SocketAddr, path_and_query: &str) -> WsStream {
    let url = format!("ws://{addr}{path_and_query}");
    let Ok((stream, _)) = connect_async(url).await else {
        panic!("websocket connect failed for {path_and_query}");
    };
    stream
}

/// Polls `/stats` until the hub reports the expected number of live
/// connections, so a later publish cannot race subscription setup.
async fn wait_for_connections(addr: SocketAddr, expected: u64) {
    let url = format!("http://{addr}/stats");
    let result = tokio::time::timeout(DEADLINE, async {
        loop {
            if let Ok(response) = reqwest::get(&url).await
                && let Ok(body) = response.json::<serde_json::Value>().await
                && body.get("active_connections").and_then(serde_json::Value::as_u64)
                    == Some(expected)
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "hub never reached {expected} connections");
}

/// Reads frames until one carries the wanted action, skipping the
/// local connect/disconnect notices and unrelated events.
async fn next_action(stream: &mut WsStream, wanted: ActionTag) -> Envelope {
    let result = tokio::time::timeout(DEADLINE, async {
        loop {
            let Some(Ok(message)) = stream.next().await else {
                panic!("socket closed while waiting for {wanted:?}");
            };
            let Message::Text(text) = message else {
                continue;
            };
            let Ok(envelope) = Envelope::decode(text.as_str()) else {
                panic!("hub sent an undecodable frame: {text}");
            };
            if envelope.action == wanted {
                return envelope;
            }
        }
    })
    .await;
    let Ok(envelope) = result else {
        panic!("timed out waiting for {wanted:?}");
    };
    envelope
}

#[tokio::test]
async fn health_endpoint_reports_healthy() {
    let (addr, _store) = spawn_hub().await;

    let Ok(response) = reqwest::get(format!("http://{addr}/health")).await else {
        panic!("health request failed");
    };
    assert_eq!(response.status().as_u16(), 200);
    let Ok(body) = response.json::<serde_json::Value>().await else {
        panic!("health body not json");
    };
    assert_eq!(
        body.get("status").and_then(serde_json::Value::as_str),
        Some("healthy")
    );
}

#[tokio::test]
async fn unknown_token_is_rejected() {
    let (addr, _store) = spawn_hub().await;

    let url = format!("ws://{addr}/ws?token=wrong");
    assert!(connect_async(url).await.is_err(), "upgrade must be refused");
}

#[tokio::test]
async fn node_connect_flips_presence_and_notifies_owner() {
    let (addr, store) = spawn_hub().await;

    let mut user_ws = connect_ws(addr, "/ws?token=user-token").await;
    wait_for_connections(addr, 1).await;

    let _node_ws = connect_ws(addr, "/ws/nodes?token=node-token").await;

    let envelope = next_action(&mut user_ws, ActionTag::UpdatedNode).await;
    let data = envelope.data.unwrap_or_default();
    assert_eq!(data.get("id").and_then(serde_json::Value::as_i64), Some(1));
    assert_eq!(
        data.get("is_online").and_then(serde_json::Value::as_bool),
        Some(true)
    );

    let Ok(Some(node)) = store.node(NodeId::new(1)).await else {
        panic!("node missing from store");
    };
    assert!(node.is_online);
}

#[tokio::test]
async fn lamp_change_from_node_reaches_owner_with_db_id() {
    let (addr, store) = spawn_hub().await;

    let mut user_ws = connect_ws(addr, "/ws?token=user-token").await;
    wait_for_connections(addr, 1).await;
    let mut node_ws = connect_ws(addr, "/ws/nodes?token=node-token").await;
    wait_for_connections(addr, 2).await;

    let frame = json!({
        "request_id": "7",
        "action": "lamp_changed",
        "data": {"id": 16, "value": 1}
    })
    .to_string();
    let Ok(()) = node_ws.send(Message::Text(frame.into())).await else {
        panic!("send failed");
    };

    let envelope = next_action(&mut user_ws, ActionTag::UpdatedLamp).await;
    assert_eq!(envelope.request_id, "1");
    let data = envelope.data.unwrap_or_default();
    // The node-local pin 16 is translated to the database id 1.
    assert_eq!(data.get("id").and_then(serde_json::Value::as_i64), Some(1));
    assert_eq!(data.get("value").and_then(serde_json::Value::as_i64), Some(1));
    assert!(
        data.get("updated").and_then(serde_json::Value::as_str).is_some(),
        "updated timestamp missing"
    );

    let Ok(Some(lamp)) = store.lamp(1).await else {
        panic!("lamp missing from store");
    };
    assert_eq!(lamp.value, 1);
}

#[tokio::test]
async fn node_disconnect_flips_presence_and_notifies_owner_once() {
    let (addr, store) = spawn_hub().await;

    let mut user_ws = connect_ws(addr, "/ws?token=user-token").await;
    wait_for_connections(addr, 1).await;
    let node_ws = connect_ws(addr, "/ws/nodes?token=node-token").await;

    // Wait for the online transition before dropping the node.
    let envelope = next_action(&mut user_ws, ActionTag::UpdatedNode).await;
    let data = envelope.data.unwrap_or_default();
    assert_eq!(
        data.get("is_online").and_then(serde_json::Value::as_bool),
        Some(true)
    );

    // Ungraceful disconnect: drop the TCP stream without a close frame.
    drop(node_ws);

    let envelope = next_action(&mut user_ws, ActionTag::UpdatedNode).await;
    let data = envelope.data.unwrap_or_default();
    assert_eq!(data.get("id").and_then(serde_json::Value::as_i64), Some(1));
    assert_eq!(
        data.get("is_online").and_then(serde_json::Value::as_bool),
        Some(false)
    );

    let Ok(Some(node)) = store.node(NodeId::new(1)).await else {
        panic!("node missing from store");
    };
    assert!(!node.is_online);
}

#[tokio::test]
async fn invalid_frames_leave_the_connection_usable() {
    let (addr, _store) = spawn_hub().await;

    let mut user_ws = connect_ws(addr, "/ws?token=user-token").await;
    wait_for_connections(addr, 1).await;
    let mut node_ws = connect_ws(addr, "/ws/nodes?token=node-token").await;
    wait_for_connections(addr, 2).await;

    // Garbage, an unknown tag, and a known tag over the wrong role must
    // all be swallowed without closing the socket.
    for frame in [
        "not json".to_string(),
        json!({"request_id": "1", "action": "teleport", "data": null}).to_string(),
        json!({"request_id": "1", "action": "restart_node", "data": {"id": 1}}).to_string(),
    ] {
        let Ok(()) = node_ws.send(Message::Text(frame.into())).await else {
            panic!("send failed");
        };
    }

    // A valid frame afterwards still flows end to end.
    let frame = json!({
        "request_id": "7",
        "action": "lamp_changed",
        "data": {"id": 16, "value": 1}
    })
    .to_string();
    let Ok(()) = node_ws.send(Message::Text(frame.into())).await else {
        panic!("send failed");
    };

    let envelope = next_action(&mut user_ws, ActionTag::UpdatedLamp).await;
    assert_eq!(
        envelope.data.unwrap_or_default().get("value").and_then(serde_json::Value::as_i64),
        Some(1)
    );
}
