//! Realtime gateway
//!
//! Owns client connections: binds them to sessions, routes inbound events to
//! the registry and the voice pipeline, and fans outbound events out through
//! per-connection queues.

mod events;
mod outbox;
mod realtime;

pub use events::{InboundEvent, OutboundEvent};
pub use outbox::Outbox;
pub use realtime::RealtimeGateway;
