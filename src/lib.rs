//! # lumen-hub
//!
//! WebSocket hub and message bus for smart-home device nodes and
//! browser clients.
//!
//! Every live connection — a device node or a browser tab — is mapped
//! onto a pub/sub channel named after its entity (`node-<id>`,
//! `user-<id>`). A background delivery task per subscription drains the
//! channel and forwards envelopes to the socket, while the connection's
//! read loop dispatches inbound envelopes through the action layer,
//! which mutates stored state and publishes derived events to the other
//! side's channels.
//!
//! ## Architecture
//!
//! ```text
//! Clients (node WS, user WS, REST)
//!     │
//!     ├── WS Handlers + Connection Loops (ws/)
//!     ├── REST Handlers (api/)
//!     │
//!     ├── ActionDispatcher (actions/)
//!     ├── Bus + Subscriptions (bus/)
//!     │
//!     ├── PubSub transport (bus/transport)
//!     └── Store: PostgreSQL or in-memory (store/)
//! ```

pub mod actions;
pub mod api;
pub mod app_state;
pub mod bus;
pub mod config;
pub mod domain;
pub mod error;
pub mod store;
pub mod ws;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

/// Composes the complete application router: REST endpoints, both
/// WebSocket upgrade routes, and the middleware stack.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(api::build_router())
        .merge(ws::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
