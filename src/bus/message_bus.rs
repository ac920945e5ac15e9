//! The message bus: lifecycle authority for publish and subscribe.
//!
//! [`Bus`] is constructed once at startup and passed by clone into the
//! connection handlers and the action dispatcher — there is no implicit
//! global. Its transport connection is opened exactly once; repeated
//! [`Bus::connect`] calls are no-ops after the first success.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OnceCell, mpsc};

use super::subscription::Subscription;
use super::transport::PubSub;
use crate::domain::{ChannelId, Envelope};
use crate::error::HubError;

/// Publish/subscribe orchestrator shared by all connections.
#[derive(Debug, Clone)]
pub struct Bus {
    transport: PubSub,
    connected: Arc<OnceCell<()>>,
    poll_interval: Duration,
}

impl Bus {
    /// Creates a bus over the given transport.
    ///
    /// `poll_interval` bounds how long a delivery task waits for a frame
    /// before re-checking its socket's connection state.
    #[must_use]
    pub fn new(transport: PubSub, poll_interval: Duration) -> Self {
        Self {
            transport,
            connected: Arc::new(OnceCell::new()),
            poll_interval,
        }
    }

    /// Opens the transport connection, at most once per process.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Transport`] if the transport cannot connect;
    /// a later call will retry.
    pub async fn connect(&self) -> Result<(), HubError> {
        self.connected
            .get_or_try_init(|| async {
                self.transport.connect().await?;
                tracing::info!("message bus connected to transport");
                Ok::<(), HubError>(())
            })
            .await?;
        Ok(())
    }

    /// Serializes an envelope and publishes it to a channel.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Transport`] on transport failure; the caller
    /// is expected to log and continue rather than tear anything down.
    pub async fn publish(&self, channel: &ChannelId, envelope: &Envelope) -> Result<(), HubError> {
        let frame = envelope.encode()?;
        let delivered = self.transport.publish(channel, frame).await?;
        tracing::debug!(channel = %channel, action = %envelope.action, delivered, "envelope published");
        Ok(())
    }

    /// Subscribes a connection's outbound queue to a channel and starts
    /// the delivery task for it.
    ///
    /// Calling this twice for the same socket opens two independent
    /// subscriptions, each with its own delivery task; fan-out is not
    /// deduplicated.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Transport`] if the channel cannot be
    /// subscribed; the connection cannot function without its channel
    /// and should be rejected by the caller.
    pub async fn subscribe(
        &self,
        outbound: mpsc::UnboundedSender<Envelope>,
        channel: ChannelId,
    ) -> Result<Subscription, HubError> {
        let inner = self.transport.subscribe(&channel).await?;
        tracing::info!(channel = %channel, "connection subscribed");
        Ok(Subscription::start(
            self.transport.clone(),
            inner,
            outbound,
            self.poll_interval,
        ))
    }

    /// Returns a handle to the underlying transport.
    #[must_use]
    pub fn transport(&self) -> &PubSub {
        &self.transport
    }
}
