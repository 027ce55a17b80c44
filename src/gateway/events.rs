use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::TtsMode;
use crate::session::{SessionMeta, SessionStatus};

/// Events a client sends over its connection (JSON text frames, tagged by `type`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InboundEvent {
    #[serde(rename_all = "camelCase")]
    Join {
        session_id: String,
        user_id: Option<String>,
        job_position: Option<String>,
        background: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    Leave { session_id: String },

    #[serde(rename_all = "camelCase")]
    Text { session_id: String, text: String },

    /// Base64 16-bit mono PCM (binary frames carry raw PCM instead)
    #[serde(rename_all = "camelCase")]
    AudioFrame { session_id: String, pcm: String },

    #[serde(rename_all = "camelCase")]
    Interrupt { session_id: String },

    #[serde(rename_all = "camelCase")]
    StatusQuery { session_id: String },

    /// Client finished playing the last assistant utterance
    #[serde(rename_all = "camelCase")]
    PlaybackFinished { session_id: String },

    /// Interview is over; queue the analysis report
    #[serde(rename_all = "camelCase")]
    Complete { session_id: String },
}

impl InboundEvent {
    pub fn session_id(&self) -> &str {
        match self {
            InboundEvent::Join { session_id, .. }
            | InboundEvent::Leave { session_id }
            | InboundEvent::Text { session_id, .. }
            | InboundEvent::AudioFrame { session_id, .. }
            | InboundEvent::Interrupt { session_id }
            | InboundEvent::StatusQuery { session_id }
            | InboundEvent::PlaybackFinished { session_id }
            | InboundEvent::Complete { session_id } => session_id,
        }
    }

    /// Metadata carried by a join; empty for every other event
    pub fn meta(&self) -> SessionMeta {
        match self {
            InboundEvent::Join {
                user_id,
                job_position,
                background,
                ..
            } => SessionMeta {
                user_id: user_id.clone(),
                job_position: job_position.clone(),
                background: background.clone(),
            },
            _ => SessionMeta::default(),
        }
    }
}

/// Events fanned out to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundEvent {
    #[serde(rename_all = "camelCase")]
    Joined { session_id: String },

    #[serde(rename_all = "camelCase")]
    Utterance {
        session_id: String,
        text: String,
        audio_ref: Option<String>,
        duration_ms: u64,
        tts_mode: TtsMode,
        is_welcome: bool,
        /// Candidate text this reply answers
        user_text: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    PartialTranscript { session_id: String, text: String },

    #[serde(rename_all = "camelCase")]
    Interrupted { session_id: String },

    #[serde(rename_all = "camelCase")]
    Error {
        session_id: Option<String>,
        message: String,
    },

    Status(SessionStatus),

    #[serde(rename_all = "camelCase")]
    AnalysisQueued { session_id: String, task_id: Uuid },
}

impl OutboundEvent {
    pub fn error(session_id: Option<&str>, message: impl Into<String>) -> Self {
        OutboundEvent::Error {
            session_id: session_id.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn is_welcome(&self) -> bool {
        matches!(
            self,
            OutboundEvent::Utterance {
                is_welcome: true,
                ..
            }
        )
    }
}
