//! Message bus core: transport façade, subscriptions, and the bus itself.
//!
//! Layering, bottom up: [`transport::PubSub`] is the pub/sub broker
//! façade; [`subscription::Subscription`] binds one connection to one
//! channel with a background delivery task; [`message_bus::Bus`]
//! orchestrates subscription creation and envelope publishing.

pub mod message_bus;
pub mod subscription;
pub mod transport;

pub use message_bus::Bus;
pub use subscription::Subscription;
pub use transport::{ChannelSubscription, PubSub};
