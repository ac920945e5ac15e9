//! PostgreSQL implementation of the [`Store`] seam.
//!
//! Schema (managed outside this crate): `nodes`, `users`, `user_nodes`
//! (ownership), `node_tokens`, `user_tokens`, `node_lamps`,
//! `node_sensors`, `node_sensors_history`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::Store;
use crate::domain::{Lamp, Node, NodeId, Sensor, SensorReading, User, UserId};
use crate::error::HubError;

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

type LampRow = (i64, i64, i64, String, i64, DateTime<Utc>);
type SensorRow = (i64, i64, i64, String, f64, DateTime<Utc>);

fn lamp_from_row(row: LampRow) -> Lamp {
    let (id, node_id, node_lamp_id, name, value, updated) = row;
    Lamp {
        id,
        node_id: NodeId::new(node_id),
        node_lamp_id,
        name,
        value,
        updated,
    }
}

fn sensor_from_row(row: SensorRow) -> Sensor {
    let (id, node_id, node_sensor_id, name, value, updated) = row;
    Sensor {
        id,
        node_id: NodeId::new(node_id),
        node_sensor_id,
        name,
        value,
        updated,
    }
}

fn persistence_err(err: sqlx::Error) -> HubError {
    HubError::Persistence(err.to_string())
}

impl PgStore {
    /// Creates a store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn node(&self, id: NodeId) -> Result<Option<Node>, HubError> {
        let row = sqlx::query_as::<_, (i64, Option<String>, bool, bool)>(
            "SELECT id, url, is_active, is_online FROM nodes WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence_err)?;

        Ok(row.map(|(id, url, is_active, is_online)| Node {
            id: NodeId::new(id),
            url,
            is_active,
            is_online,
        }))
    }

    async fn node_by_token(&self, token: &str) -> Result<Option<Node>, HubError> {
        let row = sqlx::query_as::<_, (i64, Option<String>, bool, bool)>(
            "SELECT n.id, n.url, n.is_active, n.is_online FROM nodes n \
             JOIN node_tokens t ON t.node_id = n.id WHERE t.token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence_err)?;

        Ok(row.map(|(id, url, is_active, is_online)| Node {
            id: NodeId::new(id),
            url,
            is_active,
            is_online,
        }))
    }

    async fn user_by_token(&self, token: &str) -> Result<Option<User>, HubError> {
        let row = sqlx::query_as::<_, (i64, String)>(
            "SELECT u.id, u.email FROM users u \
             JOIN user_tokens t ON t.user_id = u.id WHERE t.token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence_err)?;

        Ok(row.map(|(id, email)| User {
            id: UserId::new(id),
            email,
        }))
    }

    async fn node_users(&self, id: NodeId) -> Result<Vec<UserId>, HubError> {
        let rows = sqlx::query_as::<_, (i64,)>(
            "SELECT user_id FROM user_nodes WHERE node_id = $1 ORDER BY user_id",
        )
        .bind(id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(persistence_err)?;

        Ok(rows.into_iter().map(|(user_id,)| UserId::new(user_id)).collect())
    }

    async fn set_node_online(&self, id: NodeId, online: bool) -> Result<(), HubError> {
        let result = sqlx::query("UPDATE nodes SET is_online = $2 WHERE id = $1")
            .bind(id.get())
            .bind(online)
            .execute(&self.pool)
            .await
            .map_err(persistence_err)?;

        if result.rows_affected() == 0 {
            return Err(HubError::Persistence(format!("node {id} does not exist")));
        }
        Ok(())
    }

    async fn lamp(&self, id: i64) -> Result<Option<Lamp>, HubError> {
        let row = sqlx::query_as::<_, LampRow>(
            "SELECT id, node_id, node_lamp_id, name, value, updated FROM node_lamps WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence_err)?;

        Ok(row.map(lamp_from_row))
    }

    async fn lamp_by_node_ref(
        &self,
        node_id: NodeId,
        node_lamp_id: i64,
    ) -> Result<Option<Lamp>, HubError> {
        let row = sqlx::query_as::<_, LampRow>(
            "SELECT id, node_id, node_lamp_id, name, value, updated FROM node_lamps \
             WHERE node_id = $1 AND node_lamp_id = $2",
        )
        .bind(node_id.get())
        .bind(node_lamp_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence_err)?;

        Ok(row.map(lamp_from_row))
    }

    async fn update_lamp_value(&self, id: i64, value: i64) -> Result<Lamp, HubError> {
        let row = sqlx::query_as::<_, LampRow>(
            "UPDATE node_lamps SET value = $2, updated = now() WHERE id = $1 \
             RETURNING id, node_id, node_lamp_id, name, value, updated",
        )
        .bind(id)
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence_err)?;

        row.map(lamp_from_row)
            .ok_or_else(|| HubError::Persistence(format!("lamp {id} does not exist")))
    }

    async fn sensor_by_node_ref(
        &self,
        node_id: NodeId,
        node_sensor_id: i64,
    ) -> Result<Option<Sensor>, HubError> {
        let row = sqlx::query_as::<_, SensorRow>(
            "SELECT id, node_id, node_sensor_id, name, value, updated FROM node_sensors \
             WHERE node_id = $1 AND node_sensor_id = $2",
        )
        .bind(node_id.get())
        .bind(node_sensor_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence_err)?;

        Ok(row.map(sensor_from_row))
    }

    async fn update_sensor_value(&self, id: i64, value: f64) -> Result<Sensor, HubError> {
        let row = sqlx::query_as::<_, SensorRow>(
            "UPDATE node_sensors SET value = $2, updated = now() WHERE id = $1 \
             RETURNING id, node_id, node_sensor_id, name, value, updated",
        )
        .bind(id)
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence_err)?;

        let sensor = row
            .map(sensor_from_row)
            .ok_or_else(|| HubError::Persistence(format!("sensor {id} does not exist")))?;

        sqlx::query("INSERT INTO node_sensors_history (sensor_id, changed, value) VALUES ($1, $2, $3)")
            .bind(sensor.id)
            .bind(sensor.updated)
            .bind(sensor.value)
            .execute(&self.pool)
            .await
            .map_err(persistence_err)?;

        Ok(sensor)
    }

    async fn sensor_history(&self, sensor_id: i64) -> Result<Vec<SensorReading>, HubError> {
        let rows = sqlx::query_as::<_, (i64, DateTime<Utc>, f64)>(
            "SELECT sensor_id, changed, value FROM node_sensors_history \
             WHERE sensor_id = $1 ORDER BY changed ASC",
        )
        .bind(sensor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(persistence_err)?;

        Ok(rows
            .into_iter()
            .map(|(sensor_id, changed, value)| SensorReading {
                sensor_id,
                changed,
                value,
            })
            .collect())
    }
}
