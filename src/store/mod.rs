//! Persistence collaborator seam.
//!
//! Entities (nodes, users, lamps, sensors, tokens) are owned by an
//! external storage layer; the hub core only reads identity and the
//! node↔user ownership relation, and writes the handful of fields its
//! actions mutate. [`Store`] is the boundary: [`postgres::PgStore`] is
//! the production implementation, [`memory::MemoryStore`] backs tests
//! and persistence-disabled runs.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::domain::{Lamp, Node, NodeId, Sensor, SensorReading, User, UserId};
use crate::error::HubError;

/// Storage operations the hub core depends on.
#[async_trait]
pub trait Store: Send + Sync + std::fmt::Debug {
    /// Looks up a node by id.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Persistence`] on storage failure.
    async fn node(&self, id: NodeId) -> Result<Option<Node>, HubError>;

    /// Resolves a node from a connection token.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Persistence`] on storage failure.
    async fn node_by_token(&self, token: &str) -> Result<Option<Node>, HubError>;

    /// Resolves a user from a connection token.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Persistence`] on storage failure.
    async fn user_by_token(&self, token: &str) -> Result<Option<User>, HubError>;

    /// Returns the ids of all users who own the given node.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Persistence`] on storage failure.
    async fn node_users(&self, id: NodeId) -> Result<Vec<UserId>, HubError>;

    /// Flips a node's online flag.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Persistence`] on storage failure.
    async fn set_node_online(&self, id: NodeId, online: bool) -> Result<(), HubError>;

    /// Looks up a lamp by its global database id.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Persistence`] on storage failure.
    async fn lamp(&self, id: i64) -> Result<Option<Lamp>, HubError>;

    /// Looks up a lamp by owning node and node-local id.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Persistence`] on storage failure.
    async fn lamp_by_node_ref(
        &self,
        node_id: NodeId,
        node_lamp_id: i64,
    ) -> Result<Option<Lamp>, HubError>;

    /// Stores a lamp's new value, stamping the update time. Returns the
    /// updated record.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Persistence`] on storage failure or when the
    /// lamp does not exist.
    async fn update_lamp_value(&self, id: i64, value: i64) -> Result<Lamp, HubError>;

    /// Looks up a sensor by owning node and node-local id.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Persistence`] on storage failure.
    async fn sensor_by_node_ref(
        &self,
        node_id: NodeId,
        node_sensor_id: i64,
    ) -> Result<Option<Sensor>, HubError>;

    /// Stores a sensor's new value, stamping the update time and
    /// appending a history reading. Returns the updated record.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Persistence`] on storage failure or when the
    /// sensor does not exist.
    async fn update_sensor_value(&self, id: i64, value: f64) -> Result<Sensor, HubError>;

    /// Returns the recorded readings for a sensor, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Persistence`] on storage failure.
    async fn sensor_history(&self, sensor_id: i64) -> Result<Vec<SensorReading>, HubError>;
}
