//! Process-local pub/sub broker façade.
//!
//! [`PubSub`] keeps the contract of a networked broker — explicit
//! [`PubSub::connect`], publish/subscribe/unsubscribe by channel name —
//! while delivering through per-channel [`tokio::sync::broadcast`]
//! senders. Every subscription holds its own receiver, so each gets an
//! independent copy of every frame published after it subscribed.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{RwLock, broadcast};

use crate::domain::ChannelId;
use crate::error::HubError;

/// Pub/sub transport with named channels and per-subscriber fan-out.
///
/// Operations before [`PubSub::connect`] fail with a transport error;
/// a networked broker behaves the same way when the connection was
/// never opened.
#[derive(Debug, Clone)]
pub struct PubSub {
    channels: Arc<RwLock<HashMap<ChannelId, broadcast::Sender<String>>>>,
    connected: Arc<AtomicBool>,
    capacity: usize,
}

impl PubSub {
    /// Creates a transport whose per-channel ring buffers hold `capacity` frames.
    ///
    /// When a buffer is full, the oldest frames are dropped for lagging
    /// receivers.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            connected: Arc::new(AtomicBool::new(false)),
            capacity,
        }
    }

    /// Opens the transport. Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Infallible for the in-process broker; kept fallible because the
    /// contract is that of a network connection.
    pub async fn connect(&self) -> Result<(), HubError> {
        self.connected.store(true, Ordering::SeqCst);
        tracing::debug!("pub/sub transport connected");
        Ok(())
    }

    /// Returns `true` once [`PubSub::connect`] has succeeded.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn ensure_connected(&self) -> Result<(), HubError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(HubError::Transport("transport not connected".to_string()))
        }
    }

    /// Publishes a frame to a channel.
    ///
    /// Returns the number of subscriptions that received the frame;
    /// publishing to a channel nobody listens on delivers to zero and is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Transport`] if the transport is not connected.
    pub async fn publish(&self, channel: &ChannelId, frame: String) -> Result<usize, HubError> {
        self.ensure_connected()?;
        let map = self.channels.read().await;
        let delivered = map
            .get(channel)
            .map_or(0, |sender| sender.send(frame).unwrap_or(0));
        tracing::trace!(channel = %channel, delivered, "published frame");
        Ok(delivered)
    }

    /// Opens a new subscription on a channel.
    ///
    /// Each call returns an independent receiver; two subscriptions on
    /// the same channel each see every frame.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Transport`] if the transport is not connected.
    pub async fn subscribe(&self, channel: &ChannelId) -> Result<ChannelSubscription, HubError> {
        self.ensure_connected()?;
        let mut map = self.channels.write().await;
        let sender = map
            .entry(channel.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        let rx = sender.subscribe();
        tracing::debug!(channel = %channel, subscribers = sender.receiver_count(), "channel subscribed");
        Ok(ChannelSubscription {
            channel: channel.clone(),
            rx,
        })
    }

    /// Drops a channel's sender once its last subscription is gone.
    ///
    /// The caller still holds its receiver when this runs, so the entry
    /// is pruned when at most one receiver remains. Other subscriptions
    /// on the same channel are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Transport`] if the transport is not connected.
    pub async fn unsubscribe(&self, channel: &ChannelId) -> Result<(), HubError> {
        self.ensure_connected()?;
        let mut map = self.channels.write().await;
        if let Some(sender) = map.get(channel)
            && sender.receiver_count() <= 1
        {
            map.remove(channel);
            tracing::debug!(channel = %channel, "channel pruned");
        }
        Ok(())
    }

    /// Returns the number of channels with at least one subscription.
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

/// One live subscription on one channel.
#[derive(Debug)]
pub struct ChannelSubscription {
    channel: ChannelId,
    rx: broadcast::Receiver<String>,
}

impl ChannelSubscription {
    /// Returns the channel this subscription listens on.
    #[must_use]
    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// Waits for the next frame.
    ///
    /// Returns `None` once the channel is closed. A lagging receiver
    /// logs a warning and keeps reading from the oldest retained frame.
    pub async fn next_frame(&mut self) -> Option<String> {
        loop {
            match self.rx.recv().await {
                Ok(frame) => return Some(frame),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(channel = %self.channel, skipped, "subscription lagged behind channel");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
