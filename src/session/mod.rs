//! Interview session state
//!
//! This module provides the `SessionRegistry` that owns, per session:
//! - The set of bound client connections
//! - The welcome-sent flag and the welcome dedup records
//! - The last-activity clock and the deferred cleanup timer
//! - The transcript and VAD state the voice pipeline works on

mod meta;
mod registry;
mod transcript;
mod welcome;

pub use meta::SessionMeta;
pub use registry::{
    BindOutcome, Session, SessionConnectionState, SessionEntry, SessionHandle, SessionRegistry,
};
pub use transcript::{SessionStatus, Speaker, Utterance};
pub use welcome::WelcomeDedup;

/// Identifies one client connection to the gateway
pub type ConnectionId = uuid::Uuid;
