//! Domain layer: entity identity, channel routing, and the wire envelope.
//!
//! This module contains the hub-side domain model: node/user identity
//! and records, the entity → channel mapping, and the message envelope
//! with its closed action set.

pub mod channel;
pub mod entity;
pub mod envelope;

pub use channel::ChannelId;
pub use entity::{Actor, Lamp, Node, NodeId, Role, Sensor, SensorReading, User, UserId};
pub use envelope::{ActionTag, Envelope};
