use anyhow::Result;
use tokio::sync::mpsc;

/// Events produced by a streaming recognizer for one session
#[derive(Debug, Clone, PartialEq)]
pub enum RecognizerEvent {
    /// Interim hypothesis; supersedes any earlier partial
    Partial(String),
    /// Final text for the current utterance
    Final(String),
    /// Speech started
    VadBegin,
    /// Speech stopped
    VadEnd,
    /// Input level (0.0 to 1.0)
    Volume(f32),
    /// Provider-side failure; the stream may continue
    Error(String),
}

/// Configuration for one recognition stream
#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    pub session_id: String,
    /// Sample rate of the 16-bit mono PCM that will be fed
    pub sample_rate: u32,
    pub language: String,
}

impl RecognizerConfig {
    pub fn new(session_id: impl Into<String>, sample_rate: u32) -> Self {
        Self {
            session_id: session_id.into(),
            sample_rate,
            language: "zh-CN".to_string(),
        }
    }
}

/// An open recognition stream: audio goes in through `session`, events come out of `events`
pub struct RecognitionStream {
    pub session: Box<dyn RecognizerSession>,
    pub events: mpsc::Receiver<RecognizerEvent>,
}

/// Streaming speech recognizer port
///
/// Implementations:
/// - NATS: publishes PCM to an STT service and relays its transcripts
/// - Test fakes: scripted event sequences
#[async_trait::async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Open a stream for one session
    async fn start(&self, config: RecognizerConfig) -> Result<RecognitionStream>;

    /// Recognizer name for logging
    fn name(&self) -> &str;
}

/// Audio input side of a recognition stream
#[async_trait::async_trait]
pub trait RecognizerSession: Send + Sync {
    /// Feed 16-bit little-endian mono PCM
    async fn feed(&self, pcm: &[u8]) -> Result<()>;

    /// Flush and close the stream
    async fn stop(&self) -> Result<()>;
}
