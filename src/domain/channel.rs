//! Channel routing: entity → pub/sub channel name.
//!
//! Every addressable entity listens on exactly one channel, named
//! `node-<id>` or `user-<id>`. The mapping is pure and stable for the
//! entity's lifetime; nothing else about channel naming is significant
//! to the transport.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::entity::{NodeId, UserId};

/// Name of a pub/sub channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Returns the channel a node listens on (`node-<id>`).
    #[must_use]
    pub fn node(id: NodeId) -> Self {
        Self(format!("node-{id}"))
    }

    /// Returns the channel a user listens on (`user-<id>`).
    #[must_use]
    pub fn user(id: UserId) -> Self {
        Self(format!("user-{id}"))
    }

    /// Returns the channel name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
