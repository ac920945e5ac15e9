//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::actions::ActionDispatcher;
use crate::bus::Bus;
use crate::store::Store;
use crate::ws::ConnectionRegistry;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Persistence collaborator.
    pub store: Arc<dyn Store>,
    /// Message bus, constructed once at startup.
    pub bus: Bus,
    /// Registry of accepted sockets, for local broadcast and cleanup.
    pub registry: Arc<ConnectionRegistry>,
    /// Action dispatcher for inbound envelopes.
    pub dispatcher: Arc<ActionDispatcher>,
}
