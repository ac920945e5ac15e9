//! The live binding between one connection and one channel.
//!
//! A [`Subscription`] owns the background delivery task that drains the
//! transport and forwards envelopes to the connection's outbound queue.
//! Teardown order is always unsubscribe-then-cancel, and both teardown
//! paths — the connection handler's explicit [`Subscription::unsubscribe`]
//! and the delivery loop's self-teardown on a dead socket — share one
//! `closed` flag, so running them in any order or twice is harmless.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::transport::{ChannelSubscription, PubSub};
use crate::domain::{ChannelId, Envelope};

/// One connection's subscription to one channel.
#[derive(Debug)]
pub struct Subscription {
    channel: ChannelId,
    transport: PubSub,
    closed: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Binds a transport subscription to an outbound queue and starts
    /// its delivery task.
    #[must_use]
    pub fn start(
        transport: PubSub,
        inner: ChannelSubscription,
        outbound: mpsc::UnboundedSender<Envelope>,
        poll_interval: Duration,
    ) -> Self {
        let channel = inner.channel().clone();
        let closed = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(deliver(
            inner,
            outbound,
            transport.clone(),
            Arc::clone(&closed),
            poll_interval,
        ));
        tracing::debug!(channel = %channel, "subscription delivery task started");
        Self {
            channel,
            transport,
            closed,
            task,
        }
    }

    /// Returns the channel this subscription listens on.
    #[must_use]
    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// Returns `true` once teardown has begun on either path.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Tears the subscription down: transport unsubscribe first, then
    /// delivery task cancellation.
    ///
    /// Idempotent — a second call is a no-op. A failed transport
    /// unsubscribe is logged and does not block local cleanup.
    pub async fn unsubscribe(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(err) = self.transport.unsubscribe(&self.channel).await {
            tracing::warn!(channel = %self.channel, %err, "transport unsubscribe failed");
        }
        if !self.task.is_finished() {
            self.task.abort();
        }
        tracing::debug!(channel = %self.channel, "subscription torn down");
    }
}

/// Delivery loop: drain the transport subscription and forward envelopes
/// to the connection's outbound queue.
///
/// Each iteration re-checks that the outbound side is still attached,
/// bounded by `poll_interval` when no frame arrives; a detached socket
/// triggers self-teardown. A frame that fails to decode or forward is
/// logged and skipped — only the disconnect path ends the loop.
async fn deliver(
    mut sub: ChannelSubscription,
    outbound: mpsc::UnboundedSender<Envelope>,
    transport: PubSub,
    closed: Arc<AtomicBool>,
    poll_interval: Duration,
) {
    let channel = sub.channel().clone();
    loop {
        if outbound.is_closed() {
            if !closed.swap(true, Ordering::SeqCst) {
                if let Err(err) = transport.unsubscribe(&channel).await {
                    tracing::warn!(channel = %channel, %err, "transport unsubscribe failed");
                }
                tracing::debug!(channel = %channel, "socket gone, subscription torn down from delivery loop");
            }
            break;
        }

        match tokio::time::timeout(poll_interval, sub.next_frame()).await {
            // No frame within the poll interval; re-check the socket.
            Err(_) => {}
            // Transport closed the channel under us.
            Ok(None) => break,
            Ok(Some(frame)) => match Envelope::decode(&frame) {
                Ok(envelope) => {
                    if outbound.send(envelope).is_err() {
                        tracing::warn!(channel = %channel, "failed to forward envelope to socket");
                    }
                }
                Err(err) => {
                    tracing::warn!(channel = %channel, %err, "undecodable frame on channel");
                }
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{ActionTag, NodeId};
    use serde_json::json;

    const POLL: Duration = Duration::from_millis(10);

    async fn transport() -> PubSub {
        let t = PubSub::new(64);
        let Ok(()) = t.connect().await else {
            panic!("connect failed");
        };
        t
    }

    async fn subscribe(
        transport: &PubSub,
        channel: &ChannelId,
    ) -> (Subscription, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let Ok(inner) = transport.subscribe(channel).await else {
            panic!("subscribe failed");
        };
        (Subscription::start(transport.clone(), inner, tx, POLL), rx)
    }

    #[tokio::test]
    async fn forwards_published_envelopes_in_order() {
        let transport = transport().await;
        let channel = ChannelId::node(NodeId::new(1));
        let (sub, mut rx) = subscribe(&transport, &channel).await;

        for i in 0..3 {
            let envelope = Envelope::event(ActionTag::SetLampState, Some(json!({"id": i})));
            let frame = envelope.encode().unwrap_or_default();
            let Ok(_) = transport.publish(&channel, frame).await else {
                panic!("publish failed");
            };
        }

        for i in 0..3 {
            let Some(envelope) = rx.recv().await else {
                panic!("expected envelope {i}");
            };
            assert_eq!(envelope.action, ActionTag::SetLampState);
            assert_eq!(
                envelope.data.as_ref().and_then(|d| d.get("id")).and_then(serde_json::Value::as_i64),
                Some(i)
            );
        }
        sub.unsubscribe().await;
    }

    #[tokio::test]
    async fn undecodable_frame_is_skipped_not_fatal() {
        let transport = transport().await;
        let channel = ChannelId::node(NodeId::new(2));
        let (sub, mut rx) = subscribe(&transport, &channel).await;

        let Ok(_) = transport.publish(&channel, "garbage".to_string()).await else {
            panic!("publish failed");
        };
        let envelope = Envelope::event(ActionTag::Restart, None);
        let Ok(_) = transport.publish(&channel, envelope.encode().unwrap_or_default()).await else {
            panic!("publish failed");
        };

        let Some(received) = rx.recv().await else {
            panic!("expected the valid envelope");
        };
        assert_eq!(received.action, ActionTag::Restart);
        sub.unsubscribe().await;
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let transport = transport().await;
        let channel = ChannelId::node(NodeId::new(3));
        let (sub, rx) = subscribe(&transport, &channel).await;
        drop(rx);

        sub.unsubscribe().await;
        assert!(sub.is_closed());
        // Second call must be a silent no-op.
        sub.unsubscribe().await;
        assert!(sub.is_closed());
        assert_eq!(transport.channel_count().await, 0);
    }

    #[tokio::test]
    async fn two_subscriptions_on_one_channel_both_deliver() {
        let transport = transport().await;
        let channel = ChannelId::node(NodeId::new(4));
        let (sub_a, mut rx_a) = subscribe(&transport, &channel).await;
        let (sub_b, mut rx_b) = subscribe(&transport, &channel).await;

        let envelope = Envelope::event(ActionTag::Restart, None);
        let Ok(delivered) = transport.publish(&channel, envelope.encode().unwrap_or_default()).await
        else {
            panic!("publish failed");
        };
        assert_eq!(delivered, 2);

        let Some(a) = rx_a.recv().await else {
            panic!("first subscription missed the envelope");
        };
        let Some(b) = rx_b.recv().await else {
            panic!("second subscription missed the envelope");
        };
        assert_eq!(a.action, ActionTag::Restart);
        assert_eq!(b.action, ActionTag::Restart);

        sub_a.unsubscribe().await;
        sub_b.unsubscribe().await;
    }

    #[tokio::test]
    async fn dead_socket_triggers_self_teardown() {
        let transport = transport().await;
        let channel = ChannelId::node(NodeId::new(5));
        let (sub, rx) = subscribe(&transport, &channel).await;

        // Dropping the outbound receiver simulates the socket going away
        // without the handler ever calling unsubscribe.
        drop(rx);
        tokio::time::sleep(POLL * 10).await;

        assert!(sub.is_closed());
        assert_eq!(transport.channel_count().await, 0);
    }
}
