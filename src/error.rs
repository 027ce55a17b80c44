//! Error taxonomy for the realtime interview service
//!
//! Errors are contained at the smallest scope that keeps the session alive:
//! - `ValidationError` goes back to the originating connection only
//! - `PortError` becomes a session-scoped error event
//! - `QueueError` is captured on the analysis task or returned to the caller
//!   of an explicit retry

use thiserror::Error;

/// A malformed or empty inbound payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("text must not be empty")]
    EmptyText,

    #[error("sessionId must not be empty")]
    EmptySessionId,

    #[error("malformed event: {0}")]
    Malformed(String),

    #[error("audio payload is not valid base64: {0}")]
    InvalidAudio(String),
}

/// Which external collaborator failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    Recognizer,
    Responder,
    Synthesizer,
}

impl std::fmt::Display for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Port::Recognizer => "speech recognizer",
            Port::Responder => "conversational responder",
            Port::Synthesizer => "speech synthesizer",
        };
        f.write_str(name)
    }
}

/// Failure of a recognizer, responder or synthesizer call.
#[derive(Debug, Error)]
#[error("{port} failed: {message}")]
pub struct PortError {
    pub port: Port,
    pub message: String,
}

impl PortError {
    pub fn new(port: Port, err: &anyhow::Error) -> Self {
        Self {
            port,
            message: format!("{:#}", err),
        }
    }
}

/// Errors surfaced by the gateway to a single connection.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("connection {0} is not bound to a session")]
    Unbound(String),

    #[error("connection is bound to session {bound}, not {requested}")]
    SessionMismatch { bound: String, requested: String },

    #[error("session {0} is still answering the previous message")]
    TurnInProgress(String),
}

/// Errors from the analysis task queue.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("no failed analysis task found for session {0}")]
    NotFound(String),

    #[error("task store error: {0}")]
    Store(#[from] anyhow::Error),
}
