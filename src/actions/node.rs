//! Actions accepted from node connections: device telemetry.

use serde::Deserialize;
use serde_json::json;

use super::decode_payload;
use crate::bus::Bus;
use crate::domain::{ActionTag, ChannelId, Envelope, Node, NodeId};
use crate::error::HubError;
use crate::store::Store;

/// `lamp_changed` payload: node-local lamp id and its new value.
#[derive(Debug, Deserialize)]
struct LampChangedPayload {
    id: i64,
    value: i64,
}

/// `sensor_changed` payload: node-local sensor id and its new reading.
#[derive(Debug, Deserialize)]
struct SensorChangedPayload {
    id: i64,
    value: f64,
}

/// A lamp changed state on the device: store the new value and tell
/// every owning user.
///
/// An unknown lamp id is logged and dropped — the device gets no error,
/// it could not usefully react to one.
pub(super) async fn lamp_changed(
    store: &dyn Store,
    bus: &Bus,
    node: &Node,
    data: Option<&serde_json::Value>,
) -> Result<(), HubError> {
    let payload: LampChangedPayload = decode_payload(data)?;
    tracing::debug!(node = %node.id, lamp = payload.id, value = payload.value, "lamp change from node");

    let Some(lamp) = store.lamp_by_node_ref(node.id, payload.id).await? else {
        tracing::warn!(node = %node.id, lamp = payload.id, "lamp not known for node");
        return Ok(());
    };
    let lamp = store.update_lamp_value(lamp.id, payload.value).await?;

    notify_owners(
        store,
        bus,
        node.id,
        ActionTag::UpdatedLamp,
        json!({"id": lamp.id, "value": lamp.value, "updated": lamp.updated}),
    )
    .await
}

/// A sensor reported a new value: store it (with history) and tell
/// every owning user.
pub(super) async fn sensor_changed(
    store: &dyn Store,
    bus: &Bus,
    node: &Node,
    data: Option<&serde_json::Value>,
) -> Result<(), HubError> {
    let payload: SensorChangedPayload = decode_payload(data)?;
    tracing::debug!(node = %node.id, sensor = payload.id, value = payload.value, "sensor change from node");

    let Some(sensor) = store.sensor_by_node_ref(node.id, payload.id).await? else {
        tracing::warn!(node = %node.id, sensor = payload.id, "sensor not known for node");
        return Ok(());
    };
    let sensor = store.update_sensor_value(sensor.id, payload.value).await?;

    notify_owners(
        store,
        bus,
        node.id,
        ActionTag::UpdatedSensor,
        json!({"id": sensor.id, "value": sensor.value, "updated": sensor.updated}),
    )
    .await
}

/// Publishes one derived envelope to every user owning the node.
///
/// A failed publish is logged and skipped; the remaining owners still
/// get theirs.
async fn notify_owners(
    store: &dyn Store,
    bus: &Bus,
    node_id: NodeId,
    action: ActionTag,
    data: serde_json::Value,
) -> Result<(), HubError> {
    for user_id in store.node_users(node_id).await? {
        let envelope = Envelope::event(action, Some(data.clone()));
        tracing::info!(node = %node_id, user = %user_id, action = %action, "derived event to owner");
        if let Err(err) = bus.publish(&ChannelId::user(user_id), &envelope).await {
            tracing::warn!(user = %user_id, %err, "failed to publish derived event");
        }
    }
    Ok(())
}
