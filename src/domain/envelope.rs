//! Wire message envelope and the closed action tag set.
//!
//! Every frame crossing a socket — in either direction — is a JSON
//! object `{ "request_id": ..., "action": ..., "data": ... }`. The
//! action set is closed and versioned: an unknown tag fails the decode
//! instead of being silently ignored.

use serde::{Deserialize, Serialize};

use crate::error::HubError;

/// Closed set of wire actions.
///
/// Tags marked "inbound" are dispatched by the action layer; the rest
/// are emitted by the hub (or reserved by the wire contract) and have no
/// server-side handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTag {
    /// Reserved: client requests a data snapshot.
    GetData,
    /// Local notice that a client connected.
    Connect,
    /// Local notice that a client disconnected.
    Disconnect,
    /// Reserved: current values snapshot.
    #[serde(rename = "updated_values")]
    CurrentValues,
    /// Inbound (user): set lamp state across one or more nodes.
    SendLampsStateToNodes,
    /// Outbound to a node: set one lamp to a value.
    SetLampState,
    /// Inbound (node): a lamp changed state on the device.
    LampChanged,
    /// Outbound to users: a lamp's stored state was updated.
    UpdatedLamp,
    /// Inbound (node): a sensor reported a new value.
    SensorChanged,
    /// Outbound to users: a sensor's stored value was updated.
    UpdatedSensor,
    /// Outbound to users: a node's presence or metadata changed.
    UpdatedNode,
    /// Outbound to a node: restart yourself.
    Restart,
    /// Inbound (user): restart the addressed node.
    RestartNode,
}

impl ActionTag {
    /// Returns the wire name of this tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GetData => "get_data",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::CurrentValues => "updated_values",
            Self::SendLampsStateToNodes => "send_lamps_state_to_nodes",
            Self::SetLampState => "set_lamp_state",
            Self::LampChanged => "lamp_changed",
            Self::UpdatedLamp => "updated_lamp",
            Self::SensorChanged => "sensor_changed",
            Self::UpdatedSensor => "updated_sensor",
            Self::UpdatedNode => "updated_node",
            Self::Restart => "restart",
            Self::RestartNode => "restart_node",
        }
    }
}

impl std::fmt::Display for ActionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One wire message. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Correlation id. Client-chosen on requests; `"1"` on derived events.
    pub request_id: String,
    /// What this message means.
    pub action: ActionTag,
    /// Variant-specific payload. Omitted from the wire when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Envelope {
    /// Builds an envelope with an explicit correlation id.
    #[must_use]
    pub fn new(request_id: impl Into<String>, action: ActionTag, data: Option<serde_json::Value>) -> Self {
        Self {
            request_id: request_id.into(),
            action,
            data,
        }
    }

    /// Builds a hub-derived event. Derived events carry request id `"1"`.
    #[must_use]
    pub fn event(action: ActionTag, data: Option<serde_json::Value>) -> Self {
        Self::new("1", action, data)
    }

    /// Decodes an envelope from a JSON frame.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Decode`] when the frame is not valid JSON or
    /// carries an action tag outside the closed set.
    pub fn decode(frame: &str) -> Result<Self, HubError> {
        serde_json::from_str(frame).map_err(|err| HubError::Decode(err.to_string()))
    }

    /// Encodes the envelope to a JSON frame.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Internal`] if serialization fails.
    pub fn encode(&self) -> Result<String, HubError> {
        serde_json::to_string(self).map_err(|err| HubError::Internal(err.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_known_action() {
        let Ok(env) =
            Envelope::decode(r#"{"request_id":"1","action":"lamp_changed","data":{"id":17,"value":1}}"#)
        else {
            panic!("expected decode to succeed");
        };
        assert_eq!(env.action, ActionTag::LampChanged);
        assert_eq!(env.request_id, "1");
        assert_eq!(
            env.data.as_ref().and_then(|d| d.get("id")).and_then(serde_json::Value::as_i64),
            Some(17)
        );
    }

    #[test]
    fn unknown_action_fails_decode() {
        let result = Envelope::decode(r#"{"request_id":"1","action":"teleport","data":null}"#);
        assert!(matches!(result, Err(HubError::Decode(_))));
    }

    #[test]
    fn malformed_json_fails_decode() {
        let result = Envelope::decode("not json at all");
        assert!(matches!(result, Err(HubError::Decode(_))));
    }

    #[test]
    fn missing_data_is_omitted_on_the_wire() {
        let env = Envelope::event(ActionTag::Restart, None);
        let json = env.encode().unwrap_or_default();
        assert!(!json.contains("data"));
        assert!(json.contains("restart"));
    }

    #[test]
    fn renamed_tag_round_trips() {
        let env = Envelope::event(ActionTag::CurrentValues, None);
        let json = env.encode().unwrap_or_default();
        assert!(json.contains("updated_values"));

        let Ok(back) = Envelope::decode(&json) else {
            panic!("expected decode to succeed");
        };
        assert_eq!(back.action, ActionTag::CurrentValues);
    }

    #[test]
    fn event_carries_fixed_request_id() {
        let env = Envelope::event(ActionTag::UpdatedLamp, Some(json!({"id": 1})));
        assert_eq!(env.request_id, "1");
    }

    #[test]
    fn as_str_matches_wire_names() {
        assert_eq!(ActionTag::SendLampsStateToNodes.as_str(), "send_lamps_state_to_nodes");
        assert_eq!(ActionTag::CurrentValues.as_str(), "updated_values");
    }
}
