use serde::{Deserialize, Serialize};

use crate::session::Utterance;

/// Audio frame message published to NATS
#[derive(Debug, Serialize, Deserialize)]
pub struct AudioFrameMessage {
    pub session_id: String,
    pub sequence: u32,
    pub pcm: String, // Base64-encoded PCM bytes
    pub sample_rate: u32,
    pub channels: u16,
    pub timestamp: String, // RFC3339 timestamp
    #[serde(rename = "final")]
    pub final_frame: bool,
}

/// Transcript message received from the STT service
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub session_id: String,
    pub text: String,
    pub partial: bool,
    pub timestamp: String,
    #[serde(default)]
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VadKind {
    Begin,
    End,
    Volume,
}

/// Voice activity notification from the STT service
#[derive(Debug, Serialize, Deserialize)]
pub struct VadMessage {
    pub session_id: String,
    pub event: VadKind,
    #[serde(default)]
    pub volume: Option<f32>,
}

/// Request to the conversational model
#[derive(Debug, Serialize, Deserialize)]
pub struct RespondRequest {
    pub session_id: String,
    pub text: String,
    pub job_position: Option<String>,
    pub background: Option<String>,
    pub history: Vec<Utterance>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RespondReply {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// Request to the TTS service
#[derive(Debug, Serialize, Deserialize)]
pub struct SynthesizeRequest {
    pub session_id: String,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SynthesizeReply {
    #[serde(default)]
    pub audio_ref: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub error: Option<String>,
}

/// Request to the report generator
#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeReply {
    #[serde(default)]
    pub report_ref: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
