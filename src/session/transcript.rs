use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::TurnState;
use crate::speech::VadState;

/// Who produced an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The AI interviewer
    System,
    /// The candidate
    User,
}

/// A single line of the interview transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utterance {
    pub speaker: Speaker,

    pub text: String,

    /// Synthesized audio, when the server produced it
    pub audio_ref: Option<String>,

    /// When this utterance was recorded
    pub timestamp: DateTime<Utc>,

    /// False only for interim recognizer output
    pub is_final: bool,
}

impl Utterance {
    pub fn system(text: impl Into<String>, audio_ref: Option<String>) -> Self {
        Self {
            speaker: Speaker::System,
            text: text.into(),
            audio_ref,
            timestamp: Utc::now(),
            is_final: true,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
            audio_ref: None,
            timestamp: Utc::now(),
            is_final: true,
        }
    }
}

/// Point-in-time view of a session, returned by status queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub session_id: String,

    /// Turn engine state
    pub state: TurnState,

    pub vad: VadState,

    pub welcome_sent: bool,

    /// Number of bound connections
    pub connections: usize,

    /// Number of utterances recorded so far
    pub transcript_len: usize,
}

impl SessionStatus {
    /// Status reported for a session the registry does not know
    pub fn unknown(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            state: TurnState::Idle,
            vad: VadState::Idle,
            welcome_sent: false,
            connections: 0,
            transcript_len: 0,
        }
    }
}
