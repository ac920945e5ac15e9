//! Action dispatch: inbound envelopes → handlers.
//!
//! The dispatch table is static and role-checked: each arm matches an
//! `(action, actor)` pair, so an action arriving over the wrong role's
//! connection fails fast with a named error instead of hitting a
//! handler that assumes the other role. Handlers may mutate the store
//! and publish derived envelopes; none of their failures terminate the
//! owning connection.

mod node;
mod user;

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::bus::Bus;
use crate::domain::{ActionTag, Actor, Envelope};
use crate::error::HubError;
use crate::store::Store;

/// Routes inbound envelopes to their action handlers.
#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    store: Arc<dyn Store>,
    bus: Bus,
}

impl ActionDispatcher {
    /// Creates a dispatcher over the given store and bus.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, bus: Bus) -> Self {
        Self { store, bus }
    }

    /// Processes one inbound envelope on behalf of the given actor.
    ///
    /// # Errors
    ///
    /// - [`HubError::UnknownAction`] when the tag has no handler.
    /// - [`HubError::ActionNotAllowed`] when the tag is not accepted
    ///   from the actor's role.
    /// - [`HubError::Decode`] when the payload is missing or malformed.
    /// - [`HubError::Persistence`] when the store fails mid-handler.
    ///
    /// All of these are connection-scoped: the caller logs them and
    /// keeps reading.
    pub async fn dispatch(&self, actor: &Actor, envelope: &Envelope) -> Result<(), HubError> {
        tracing::info!(action = %envelope.action, role = %actor.role(), "dispatching action");
        let store = self.store.as_ref();

        match (envelope.action, actor) {
            (ActionTag::LampChanged, Actor::Node(n)) => {
                node::lamp_changed(store, &self.bus, n, envelope.data.as_ref()).await
            }
            (ActionTag::SensorChanged, Actor::Node(n)) => {
                node::sensor_changed(store, &self.bus, n, envelope.data.as_ref()).await
            }
            (ActionTag::SendLampsStateToNodes, Actor::User(u)) => {
                user::send_lamps_state_to_nodes(store, &self.bus, u, envelope.data.as_ref()).await
            }
            (ActionTag::RestartNode, Actor::User(u)) => {
                user::restart_node(store, &self.bus, u, envelope.data.as_ref()).await
            }
            (
                action @ (ActionTag::LampChanged
                | ActionTag::SensorChanged
                | ActionTag::SendLampsStateToNodes
                | ActionTag::RestartNode),
                _,
            ) => Err(HubError::ActionNotAllowed {
                action,
                role: actor.role(),
            }),
            (action, _) => Err(HubError::UnknownAction(action)),
        }
    }
}

/// Decodes an action payload from the envelope's `data` field.
fn decode_payload<T: DeserializeOwned>(data: Option<&serde_json::Value>) -> Result<T, HubError> {
    let value = data.ok_or_else(|| HubError::Decode("missing data payload".to_string()))?;
    serde_json::from_value(value.clone()).map_err(|err| HubError::Decode(err.to_string()))
}
