//! Per-connection control loops for node and user sockets.
//!
//! Both roles run the same machine — accept, register, subscribe, then
//! a select loop interleaving outbound forwarding with inbound
//! read/dispatch, then teardown — but the node path also owns the
//! node's presence: the persisted online flag flips with the connection
//! and every transition fans an `updated_node` event out to the owning
//! users' channels.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;

use crate::app_state::AppState;
use crate::domain::{ActionTag, Actor, ChannelId, Envelope, Node, NodeId, User};
use crate::error::HubError;

/// Runs the control loop for an authenticated node socket.
pub async fn run_node_connection(socket: WebSocket, node: Node, state: AppState) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let conn_id = state.registry.register(outbound_tx.clone()).await;

    let channel = ChannelId::node(node.id);
    let subscription = match state.bus.subscribe(outbound_tx, channel).await {
        Ok(sub) => sub,
        Err(err) => {
            // The connection cannot function without its channel.
            tracing::error!(node = %node.id, %err, "channel subscribe failed, rejecting node connection");
            state.registry.deregister(conn_id).await;
            return;
        }
    };
    tracing::info!(node = %node.id, connection = %conn_id, "node connected");

    if let Err(err) = set_node_presence(&state, node.id, true).await {
        tracing::warn!(node = %node.id, %err, "failed to mark node online");
    }
    state
        .registry
        .broadcast(&Envelope::event(
            ActionTag::Connect,
            Some(json!({"message": format!("Node #{} connected", node.id)})),
        ))
        .await;

    let actor = Actor::Node(node.clone());
    run_socket_loop(socket, &actor, &state, outbound_rx).await;

    // Teardown order: registry first, then the subscription
    // (unsubscribe-then-cancel inside), then presence.
    state.registry.deregister(conn_id).await;
    subscription.unsubscribe().await;
    if let Err(err) = set_node_presence(&state, node.id, false).await {
        tracing::warn!(node = %node.id, %err, "failed to mark node offline");
    }
    state
        .registry
        .broadcast(&Envelope::event(
            ActionTag::Disconnect,
            Some(json!({"message": format!("Node #{} disconnected", node.id)})),
        ))
        .await;
    tracing::info!(node = %node.id, connection = %conn_id, "node disconnected");
}

/// Runs the control loop for an authenticated user socket.
pub async fn run_user_connection(socket: WebSocket, user: User, state: AppState) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let conn_id = state.registry.register(outbound_tx.clone()).await;

    let channel = ChannelId::user(user.id);
    let subscription = match state.bus.subscribe(outbound_tx, channel).await {
        Ok(sub) => sub,
        Err(err) => {
            tracing::error!(user = %user.id, %err, "channel subscribe failed, rejecting user connection");
            state.registry.deregister(conn_id).await;
            return;
        }
    };
    tracing::info!(user = %user.id, connection = %conn_id, "user connected");

    let actor = Actor::User(user.clone());
    run_socket_loop(socket, &actor, &state, outbound_rx).await;

    state.registry.deregister(conn_id).await;
    subscription.unsubscribe().await;
    tracing::info!(user = %user.id, connection = %conn_id, "user disconnected");
}

/// The shared read/write loop.
///
/// Outbound envelopes (from the subscription's delivery task and from
/// registry broadcasts) are encoded and written to the socket; inbound
/// text frames are decoded and dispatched strictly one at a time in
/// arrival order. A decode failure drops the frame and keeps reading.
async fn run_socket_loop(
    socket: WebSocket,
    actor: &Actor,
    state: &AppState,
    mut outbound_rx: mpsc::UnboundedReceiver<Envelope>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                let Some(envelope) = outbound else { break };
                match envelope.encode() {
                    Ok(frame) => {
                        if ws_tx.send(Message::text(frame)).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => tracing::warn!(%err, "failed to encode outbound envelope"),
                }
            }
            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(actor, state, text.as_str()).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!(role = %actor.role(), %err, "socket read error");
                        break;
                    }
                    // Ping/pong are handled by axum; binary is not part
                    // of the wire contract.
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

/// Decodes one inbound frame and hands it to the dispatcher.
///
/// All failures are connection-scoped: logged, never fatal to the loop.
async fn handle_frame(actor: &Actor, state: &AppState, frame: &str) {
    let envelope = match Envelope::decode(frame) {
        Ok(envelope) => envelope,
        Err(err) => {
            tracing::warn!(role = %actor.role(), %err, "dropping undecodable frame");
            return;
        }
    };

    if let Actor::Node(node) = actor {
        heal_online_flag(state, node).await;
    }

    if let Err(err) = state.dispatcher.dispatch(actor, &envelope).await {
        tracing::warn!(role = %actor.role(), action = %envelope.action, %err, "action dispatch failed");
    }
}

/// Corrects a stale offline flag before dispatching.
///
/// An ungraceful disconnect can leave the persisted flag false while a
/// new connection is already live; a frame from the node proves it is
/// connected.
async fn heal_online_flag(state: &AppState, node: &Node) {
    match state.store.node(node.id).await {
        Ok(Some(current)) if !current.is_online => {
            tracing::warn!(node = %node.id, "online flag was stale, correcting");
            if let Err(err) = set_node_presence(state, node.id, true).await {
                tracing::warn!(node = %node.id, %err, "failed to heal online flag");
            }
        }
        Ok(_) => {}
        Err(err) => tracing::warn!(node = %node.id, %err, "failed to read node state"),
    }
}

/// Flips the node's persisted online flag and publishes `updated_node`
/// to every owning user's channel.
async fn set_node_presence(state: &AppState, node_id: NodeId, online: bool) -> Result<(), HubError> {
    state.store.set_node_online(node_id, online).await?;
    let data = json!({"id": node_id, "is_online": online});
    for user_id in state.store.node_users(node_id).await? {
        let envelope = Envelope::event(ActionTag::UpdatedNode, Some(data.clone()));
        if let Err(err) = state.bus.publish(&ChannelId::user(user_id), &envelope).await {
            tracing::warn!(user = %user_id, %err, "failed to publish node presence");
        }
    }
    Ok(())
}
