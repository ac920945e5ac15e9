//! Axum WebSocket upgrade handlers.
//!
//! Authentication happens here, before the socket reaches the core: the
//! connection token is resolved through the store, and the resulting
//! entity is handed to the connection loop. The core never sees
//! credentials.

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use serde::Deserialize;

use super::connection::{run_node_connection, run_user_connection};
use crate::app_state::AppState;
use crate::error::HubError;

/// Query parameters of a WebSocket upgrade request.
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    /// Connection token issued by the authentication layer.
    pub token: String,
}

/// `GET /ws/nodes` — upgrade an authenticated device node connection.
///
/// # Errors
///
/// Returns [`HubError::Unauthorized`] for an unknown token and
/// [`HubError::Persistence`] if the token lookup fails.
pub async fn node_ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> Result<Response, HubError> {
    let node = state
        .store
        .node_by_token(&params.token)
        .await?
        .ok_or_else(|| HubError::Unauthorized("unknown node token".to_string()))?;

    Ok(ws.on_upgrade(move |socket| run_node_connection(socket, node, state)))
}

/// `GET /ws` — upgrade an authenticated browser user connection.
///
/// # Errors
///
/// Returns [`HubError::Unauthorized`] for an unknown token and
/// [`HubError::Persistence`] if the token lookup fails.
pub async fn user_ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> Result<Response, HubError> {
    let user = state
        .store
        .user_by_token(&params.token)
        .await?
        .ok_or_else(|| HubError::Unauthorized("unknown user token".to_string()))?;

    Ok(ws.on_upgrade(move |socket| run_user_connection(socket, user, state)))
}

/// WebSocket routes for both connection roles.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(user_ws_handler))
        .route("/ws/nodes", get(node_ws_handler))
}
