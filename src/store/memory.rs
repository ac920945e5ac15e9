//! In-memory [`Store`] implementation.
//!
//! Backs tests and runs with persistence disabled. State lives in
//! `RwLock`-protected maps; fixture insertion happens through the
//! `insert_*` methods.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::Store;
use crate::domain::{Lamp, Node, NodeId, Sensor, SensorReading, User, UserId};
use crate::error::HubError;

/// Volatile store over `RwLock`-protected maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    nodes: RwLock<HashMap<NodeId, Node>>,
    users: RwLock<HashMap<UserId, User>>,
    node_tokens: RwLock<HashMap<String, NodeId>>,
    user_tokens: RwLock<HashMap<String, UserId>>,
    ownerships: RwLock<Vec<(NodeId, UserId)>>,
    lamps: RwLock<HashMap<i64, Lamp>>,
    sensors: RwLock<HashMap<i64, Sensor>>,
    history: RwLock<Vec<SensorReading>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node, optionally registering a connection token for it.
    pub async fn insert_node(&self, node: Node, token: Option<&str>) {
        if let Some(token) = token {
            self.node_tokens.write().await.insert(token.to_string(), node.id);
        }
        self.nodes.write().await.insert(node.id, node);
    }

    /// Inserts a user, optionally registering a connection token for them.
    pub async fn insert_user(&self, user: User, token: Option<&str>) {
        if let Some(token) = token {
            self.user_tokens.write().await.insert(token.to_string(), user.id);
        }
        self.users.write().await.insert(user.id, user);
    }

    /// Links a user as an owner of a node.
    pub async fn link_owner(&self, node_id: NodeId, user_id: UserId) {
        self.ownerships.write().await.push((node_id, user_id));
    }

    /// Inserts a lamp.
    pub async fn insert_lamp(&self, lamp: Lamp) {
        self.lamps.write().await.insert(lamp.id, lamp);
    }

    /// Inserts a sensor.
    pub async fn insert_sensor(&self, sensor: Sensor) {
        self.sensors.write().await.insert(sensor.id, sensor);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn node(&self, id: NodeId) -> Result<Option<Node>, HubError> {
        Ok(self.nodes.read().await.get(&id).cloned())
    }

    async fn node_by_token(&self, token: &str) -> Result<Option<Node>, HubError> {
        let id = self.node_tokens.read().await.get(token).copied();
        match id {
            Some(id) => self.node(id).await,
            None => Ok(None),
        }
    }

    async fn user_by_token(&self, token: &str) -> Result<Option<User>, HubError> {
        let id = self.user_tokens.read().await.get(token).copied();
        Ok(match id {
            Some(id) => self.users.read().await.get(&id).cloned(),
            None => None,
        })
    }

    async fn node_users(&self, id: NodeId) -> Result<Vec<UserId>, HubError> {
        Ok(self
            .ownerships
            .read()
            .await
            .iter()
            .filter(|(node_id, _)| *node_id == id)
            .map(|(_, user_id)| *user_id)
            .collect())
    }

    async fn set_node_online(&self, id: NodeId, online: bool) -> Result<(), HubError> {
        let mut nodes = self.nodes.write().await;
        let node = nodes
            .get_mut(&id)
            .ok_or_else(|| HubError::Persistence(format!("node {id} does not exist")))?;
        node.is_online = online;
        Ok(())
    }

    async fn lamp(&self, id: i64) -> Result<Option<Lamp>, HubError> {
        Ok(self.lamps.read().await.get(&id).cloned())
    }

    async fn lamp_by_node_ref(
        &self,
        node_id: NodeId,
        node_lamp_id: i64,
    ) -> Result<Option<Lamp>, HubError> {
        Ok(self
            .lamps
            .read()
            .await
            .values()
            .find(|lamp| lamp.node_id == node_id && lamp.node_lamp_id == node_lamp_id)
            .cloned())
    }

    async fn update_lamp_value(&self, id: i64, value: i64) -> Result<Lamp, HubError> {
        let mut lamps = self.lamps.write().await;
        let lamp = lamps
            .get_mut(&id)
            .ok_or_else(|| HubError::Persistence(format!("lamp {id} does not exist")))?;
        lamp.value = value;
        lamp.updated = Utc::now();
        Ok(lamp.clone())
    }

    async fn sensor_by_node_ref(
        &self,
        node_id: NodeId,
        node_sensor_id: i64,
    ) -> Result<Option<Sensor>, HubError> {
        Ok(self
            .sensors
            .read()
            .await
            .values()
            .find(|sensor| sensor.node_id == node_id && sensor.node_sensor_id == node_sensor_id)
            .cloned())
    }

    async fn update_sensor_value(&self, id: i64, value: f64) -> Result<Sensor, HubError> {
        let mut sensors = self.sensors.write().await;
        let sensor = sensors
            .get_mut(&id)
            .ok_or_else(|| HubError::Persistence(format!("sensor {id} does not exist")))?;
        sensor.value = value;
        sensor.updated = Utc::now();
        let updated = sensor.clone();
        drop(sensors);

        self.history.write().await.push(SensorReading {
            sensor_id: id,
            changed: updated.updated,
            value,
        });
        Ok(updated)
    }

    async fn sensor_history(&self, sensor_id: i64) -> Result<Vec<SensorReading>, HubError> {
        Ok(self
            .history
            .read()
            .await
            .iter()
            .filter(|reading| reading.sensor_id == sensor_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn make_lamp(id: i64, node_id: i64, node_lamp_id: i64) -> Lamp {
        Lamp {
            id,
            node_id: NodeId::new(node_id),
            node_lamp_id,
            name: format!("Pin {node_lamp_id}"),
            value: 0,
            updated: Utc::now(),
        }
    }

    #[tokio::test]
    async fn token_resolution() {
        let store = MemoryStore::new();
        store
            .insert_node(
                Node {
                    id: NodeId::new(1),
                    url: None,
                    is_active: true,
                    is_online: false,
                },
                Some("n-token"),
            )
            .await;

        let Ok(Some(node)) = store.node_by_token("n-token").await else {
            panic!("expected node");
        };
        assert_eq!(node.id, NodeId::new(1));

        let Ok(None) = store.node_by_token("wrong").await else {
            panic!("expected no node");
        };
    }

    #[tokio::test]
    async fn ownership_is_per_node() {
        let store = MemoryStore::new();
        store.link_owner(NodeId::new(1), UserId::new(10)).await;
        store.link_owner(NodeId::new(1), UserId::new(11)).await;
        store.link_owner(NodeId::new(2), UserId::new(12)).await;

        let Ok(users) = store.node_users(NodeId::new(1)).await else {
            panic!("expected users");
        };
        assert_eq!(users, vec![UserId::new(10), UserId::new(11)]);
    }

    #[tokio::test]
    async fn lamp_lookup_by_node_ref_is_scoped_to_the_node() {
        let store = MemoryStore::new();
        store.insert_lamp(make_lamp(1, 1, 16)).await;
        store.insert_lamp(make_lamp(2, 2, 16)).await;

        let Ok(Some(lamp)) = store.lamp_by_node_ref(NodeId::new(2), 16).await else {
            panic!("expected lamp");
        };
        assert_eq!(lamp.id, 2);

        let Ok(None) = store.lamp_by_node_ref(NodeId::new(3), 16).await else {
            panic!("expected no lamp");
        };
    }

    #[tokio::test]
    async fn update_lamp_value_stamps_time() {
        let store = MemoryStore::new();
        let before = Utc::now();
        store.insert_lamp(make_lamp(1, 1, 16)).await;

        let Ok(updated) = store.update_lamp_value(1, 1).await else {
            panic!("expected update");
        };
        assert_eq!(updated.value, 1);
        assert!(updated.updated >= before);
    }

    #[tokio::test]
    async fn updating_missing_lamp_is_a_persistence_error() {
        let store = MemoryStore::new();
        let result = store.update_lamp_value(99, 1).await;
        assert!(matches!(result, Err(HubError::Persistence(_))));
    }

    #[tokio::test]
    async fn sensor_update_appends_history() {
        let store = MemoryStore::new();
        store
            .insert_sensor(Sensor {
                id: 5,
                node_id: NodeId::new(1),
                node_sensor_id: 116,
                name: "Temperature".to_string(),
                value: 0.0,
                updated: Utc::now(),
            })
            .await;

        let Ok(_) = store.update_sensor_value(5, 21.5).await else {
            panic!("expected update");
        };
        let Ok(_) = store.update_sensor_value(5, 22.0).await else {
            panic!("expected update");
        };

        let Ok(history) = store.sensor_history(5).await else {
            panic!("expected history");
        };
        assert_eq!(history.len(), 2);
        assert_eq!(history.first().map(|r| r.value), Some(21.5));
        assert_eq!(history.last().map(|r| r.value), Some(22.0));
    }

    #[tokio::test]
    async fn set_node_online_round_trip() {
        let store = MemoryStore::new();
        store
            .insert_node(
                Node {
                    id: NodeId::new(1),
                    url: None,
                    is_active: true,
                    is_online: false,
                },
                None,
            )
            .await;

        let Ok(()) = store.set_node_online(NodeId::new(1), true).await else {
            panic!("expected update");
        };
        let Ok(Some(node)) = store.node(NodeId::new(1)).await else {
            panic!("expected node");
        };
        assert!(node.is_online);
    }
}
