//! Actions accepted from user connections: device commands.

use serde::Deserialize;
use serde_json::json;

use super::decode_payload;
use crate::bus::Bus;
use crate::domain::{ActionTag, ChannelId, Envelope, Lamp, NodeId, User};
use crate::error::HubError;
use crate::store::Store;

/// One item of a `send_lamps_state_to_nodes` batch, addressed by the
/// lamp's global database id.
#[derive(Debug, Deserialize)]
struct LampStateItem {
    id: i64,
    value: i64,
}

/// `send_lamps_state_to_nodes` payload.
#[derive(Debug, Deserialize)]
struct LampStateBatch {
    lamps: Vec<LampStateItem>,
}

/// `restart_node` payload: the node's database id.
#[derive(Debug, Deserialize)]
struct RestartNodePayload {
    id: i64,
}

/// Fan a batch of lamp state commands out to the owning nodes.
///
/// Each item is resolved and authorized independently; a missing or
/// unowned lamp skips that item only. The caller-facing lamp id is
/// translated to the node-local id before publishing.
pub(super) async fn send_lamps_state_to_nodes(
    store: &dyn Store,
    bus: &Bus,
    user: &User,
    data: Option<&serde_json::Value>,
) -> Result<(), HubError> {
    let payload: LampStateBatch = decode_payload(data)?;
    tracing::debug!(user = %user.id, items = payload.lamps.len(), "lamp state batch from user");

    for item in payload.lamps {
        let lamp = match resolve_owned_lamp(store, user, item.id).await {
            Ok(lamp) => lamp,
            Err(HubError::TargetNotFound(target)) => {
                tracing::warn!(user = %user.id, %target, "skipping unknown lamp");
                continue;
            }
            Err(HubError::NotOwned(target)) => {
                tracing::error!(user = %user.id, %target, "skipping lamp not owned by user");
                continue;
            }
            Err(err) => return Err(err),
        };

        let envelope = Envelope::event(
            ActionTag::SetLampState,
            Some(json!({"id": lamp.node_lamp_id, "value": item.value})),
        );
        tracing::info!(user = %user.id, node = %lamp.node_id, lamp = lamp.id, "lamp command to node");
        if let Err(err) = bus.publish(&ChannelId::node(lamp.node_id), &envelope).await {
            tracing::warn!(node = %lamp.node_id, %err, "failed to publish lamp command");
        }
    }
    Ok(())
}

/// Restart the addressed node, if the acting user owns it.
///
/// The control envelope carries no payload beyond the action tag. An
/// unknown or unowned node is logged and dropped without a response.
pub(super) async fn restart_node(
    store: &dyn Store,
    bus: &Bus,
    user: &User,
    data: Option<&serde_json::Value>,
) -> Result<(), HubError> {
    let payload: RestartNodePayload = decode_payload(data)?;
    let node_id = NodeId::new(payload.id);

    let Some(node) = store.node(node_id).await? else {
        tracing::warn!(user = %user.id, node = %node_id, "restart target not found");
        return Ok(());
    };
    if !store.node_users(node.id).await?.contains(&user.id) {
        tracing::error!(user = %user.id, node = %node.id, "restart target not owned by user");
        return Ok(());
    }

    let envelope = Envelope::event(ActionTag::Restart, None);
    tracing::info!(user = %user.id, node = %node.id, "restart command to node");
    if let Err(err) = bus.publish(&ChannelId::node(node.id), &envelope).await {
        tracing::warn!(node = %node.id, %err, "failed to publish restart");
    }
    Ok(())
}

/// Resolves a lamp by database id and verifies the acting user owns its
/// node.
async fn resolve_owned_lamp(store: &dyn Store, user: &User, lamp_id: i64) -> Result<Lamp, HubError> {
    let lamp = store
        .lamp(lamp_id)
        .await?
        .ok_or_else(|| HubError::TargetNotFound(format!("lamp {lamp_id}")))?;
    if !store.node_users(lamp.node_id).await?.contains(&user.id) {
        return Err(HubError::NotOwned(format!("lamp {lamp_id}")));
    }
    Ok(lamp)
}
