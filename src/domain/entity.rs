//! Entity identity and the authenticated actor bound to a connection.
//!
//! [`NodeId`] and [`UserId`] are newtype wrappers so the two id spaces
//! cannot be confused. [`Actor`] is the tagged union handed to the core
//! at connection-accept time by the authentication collaborator; every
//! action handler receives it explicitly instead of inferring the role
//! from the concrete record type.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::channel::ChannelId;

/// Unique identifier of a device node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(i64);

impl NodeId {
    /// Wraps a raw database id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for NodeId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Unique identifier of a browser user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    /// Wraps a raw database id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A device node as stored by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Database id.
    pub id: NodeId,
    /// HTTP endpoint of the device, if it exposes one.
    pub url: Option<String>,
    /// Whether the node is administratively enabled.
    pub is_active: bool,
    /// Whether a live connection for this node is currently believed open.
    pub is_online: bool,
}

/// A browser user as stored by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Database id.
    pub id: UserId,
    /// Login email.
    pub email: String,
}

/// A controllable lamp attached to a node.
///
/// `id` is the global database id used in user-facing messages;
/// `node_lamp_id` is the node-local id (a GPIO pin on the device) used
/// in messages sent to the node itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lamp {
    /// Database id.
    pub id: i64,
    /// Owning node.
    pub node_id: NodeId,
    /// Node-local lamp id.
    pub node_lamp_id: i64,
    /// Display name.
    pub name: String,
    /// Current value (0 = off, 1 = on).
    pub value: i64,
    /// Time of the last value change.
    pub updated: DateTime<Utc>,
}

/// A sensor attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    /// Database id.
    pub id: i64,
    /// Owning node.
    pub node_id: NodeId,
    /// Node-local sensor id.
    pub node_sensor_id: i64,
    /// Display name.
    pub name: String,
    /// Last reported reading.
    pub value: f64,
    /// Time of the last value change.
    pub updated: DateTime<Utc>,
}

/// A historical sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Sensor the reading belongs to.
    pub sensor_id: i64,
    /// When the value changed.
    pub changed: DateTime<Utc>,
    /// The recorded value.
    pub value: f64,
}

/// Connection role, used for static action authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// A device node connection.
    Node,
    /// A browser user connection.
    User,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node => write!(f, "node"),
            Self::User => write!(f, "user"),
        }
    }
}

/// The authenticated entity bound to one live connection.
///
/// Constructed by the authentication layer before the socket reaches the
/// core; the core never sees credentials.
#[derive(Debug, Clone)]
pub enum Actor {
    /// A device node connection.
    Node(Node),
    /// A browser user connection.
    User(User),
}

impl Actor {
    /// Returns the connection role of this actor.
    #[must_use]
    pub const fn role(&self) -> Role {
        match self {
            Self::Node(_) => Role::Node,
            Self::User(_) => Role::User,
        }
    }

    /// Returns the pub/sub channel this actor listens on.
    #[must_use]
    pub fn channel_id(&self) -> ChannelId {
        match self {
            Self::Node(node) => ChannelId::node(node.id),
            Self::User(user) => ChannelId::user(user.id),
        }
    }
}
