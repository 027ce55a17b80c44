use anyhow::Result;
use std::time::Duration;

/// Outcome of synthesizing one assistant utterance
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    /// Where the audio can be fetched; `None` means the client speaks the text itself
    pub audio_ref: Option<String>,

    /// Expected playback length
    pub duration: Duration,
}

impl Synthesis {
    pub fn is_client_side(&self) -> bool {
        self.audio_ref.is_none()
    }
}

/// Text-to-speech port
#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, session_id: &str, text: &str) -> Result<Synthesis>;
}

/// Leaves synthesis to the client and estimates how long it will take to speak
#[derive(Debug, Clone)]
pub struct ClientSideSynthesizer {
    per_char: Duration,
}

impl ClientSideSynthesizer {
    pub fn new(per_char: Duration) -> Self {
        Self { per_char }
    }

    pub fn estimate(&self, text: &str) -> Duration {
        self.per_char * text.chars().count() as u32
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for ClientSideSynthesizer {
    async fn synthesize(&self, _session_id: &str, text: &str) -> Result<Synthesis> {
        Ok(Synthesis {
            audio_ref: None,
            duration: self.estimate(text),
        })
    }
}
