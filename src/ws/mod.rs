//! WebSocket layer: upgrade handlers, per-connection control loops, and
//! the local socket registry.

pub mod connection;
pub mod handler;
pub mod registry;

pub use handler::routes;
pub use registry::{ConnectionId, ConnectionRegistry};
