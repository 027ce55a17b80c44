use anyhow::{bail, Context, Result};
use futures::StreamExt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::client::NatsClient;
use super::messages::{
    AnalyzeReply, AnalyzeRequest, RespondReply, RespondRequest, SynthesizeReply,
    SynthesizeRequest, TranscriptMessage, VadKind, VadMessage,
};
use crate::analysis::AnalysisGenerator;
use crate::speech::{
    ConversationalResponder, RecognitionStream, RecognizerConfig, RecognizerEvent,
    RecognizerSession, ResponderContext, SpeechRecognizer, SpeechSynthesizer, Synthesis,
};

/// Recognizer events buffered per stream before the relay waits on the pipeline
const EVENT_BUFFER: usize = 100;

/// Streaming recognizer backed by an STT service on NATS
pub struct NatsRecognizer {
    client: NatsClient,
}

impl NatsRecognizer {
    pub fn new(client: NatsClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl SpeechRecognizer for NatsRecognizer {
    async fn start(&self, config: RecognizerConfig) -> Result<RecognitionStream> {
        let transcripts = self.client.subscribe_transcripts().await?;
        let vad = self.client.subscribe_vad().await?;

        let id = config.session_id.clone();
        let text_events = transcripts.map(move |msg| parse_transcript(&id, &msg.payload));
        let id = config.session_id.clone();
        let vad_events = vad.map(move |msg| parse_vad(&id, &msg.payload));
        let mut merged = futures::stream::select(text_events, vad_events).boxed();

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let session_id = config.session_id.clone();
        let relay = tokio::spawn(async move {
            while let Some(event) = merged.next().await {
                let Some(event) = event else { continue };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            debug!("Recognizer relay for session {} finished", session_id);
        });

        info!(
            "NATS recognizer stream opened for session {} ({} Hz, {})",
            config.session_id, config.sample_rate, config.language
        );

        Ok(RecognitionStream {
            session: Box::new(NatsRecognizerSession {
                client: self.client.clone(),
                session_id: config.session_id,
                sample_rate: config.sample_rate,
                sequence: AtomicU32::new(0),
                relay,
            }),
            events: rx,
        })
    }

    fn name(&self) -> &str {
        "nats"
    }
}

struct NatsRecognizerSession {
    client: NatsClient,
    session_id: String,
    sample_rate: u32,
    sequence: AtomicU32,
    relay: JoinHandle<()>,
}

#[async_trait::async_trait]
impl RecognizerSession for NatsRecognizerSession {
    async fn feed(&self, pcm: &[u8]) -> Result<()> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        self.client
            .publish_audio_frame(&self.session_id, pcm, self.sample_rate, sequence, false)
            .await
    }

    async fn stop(&self) -> Result<()> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let result = self
            .client
            .publish_audio_frame(&self.session_id, &[], self.sample_rate, sequence, true)
            .await;
        self.relay.abort();
        result
    }
}

impl Drop for NatsRecognizerSession {
    fn drop(&mut self) {
        self.relay.abort();
    }
}

fn parse_transcript(session_id: &str, payload: &[u8]) -> Option<RecognizerEvent> {
    let msg: TranscriptMessage = match serde_json::from_slice(payload) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Failed to parse transcript message: {}", e);
            return None;
        }
    };

    if msg.session_id != session_id || msg.text.trim().is_empty() {
        return None;
    }

    Some(if msg.partial {
        RecognizerEvent::Partial(msg.text)
    } else {
        RecognizerEvent::Final(msg.text)
    })
}

fn parse_vad(session_id: &str, payload: &[u8]) -> Option<RecognizerEvent> {
    let msg: VadMessage = match serde_json::from_slice(payload) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Failed to parse VAD message: {}", e);
            return None;
        }
    };

    if msg.session_id != session_id {
        return None;
    }

    Some(match msg.event {
        VadKind::Begin => RecognizerEvent::VadBegin,
        VadKind::End => RecognizerEvent::VadEnd,
        VadKind::Volume => RecognizerEvent::Volume(msg.volume.unwrap_or(0.0)),
    })
}

/// Interviewer model reached over NATS request/reply
pub struct NatsResponder {
    client: NatsClient,
    subject: String,
}

impl NatsResponder {
    pub fn new(client: NatsClient, subject: impl Into<String>) -> Self {
        Self {
            client,
            subject: subject.into(),
        }
    }
}

#[async_trait::async_trait]
impl ConversationalResponder for NatsResponder {
    async fn respond(
        &self,
        session_id: &str,
        text: &str,
        context: &ResponderContext,
    ) -> Result<String> {
        let request = RespondRequest {
            session_id: session_id.to_string(),
            text: text.to_string(),
            job_position: context.job_position.clone(),
            background: context.background.clone(),
            history: context.transcript.clone(),
        };

        let reply: RespondReply = self.client.request_json(&self.subject, &request).await?;
        if let Some(error) = reply.error {
            bail!("responder returned error: {}", error);
        }
        if reply.text.trim().is_empty() {
            bail!("responder returned an empty reply");
        }

        Ok(reply.text)
    }
}

/// Server-side TTS reached over NATS request/reply
pub struct NatsSynthesizer {
    client: NatsClient,
    subject: String,
}

impl NatsSynthesizer {
    pub fn new(client: NatsClient, subject: impl Into<String>) -> Self {
        Self {
            client,
            subject: subject.into(),
        }
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for NatsSynthesizer {
    async fn synthesize(&self, session_id: &str, text: &str) -> Result<Synthesis> {
        let request = SynthesizeRequest {
            session_id: session_id.to_string(),
            text: text.to_string(),
        };

        let reply: SynthesizeReply = self.client.request_json(&self.subject, &request).await?;
        if let Some(error) = reply.error {
            bail!("synthesizer returned error: {}", error);
        }
        let audio_ref = reply
            .audio_ref
            .context("synthesizer reply has no audio reference")?;

        Ok(Synthesis {
            audio_ref: Some(audio_ref),
            duration: Duration::from_millis(reply.duration_ms),
        })
    }
}

/// Report generator reached over NATS request/reply
pub struct NatsAnalysisGenerator {
    client: NatsClient,
    subject: String,
}

impl NatsAnalysisGenerator {
    pub fn new(client: NatsClient, subject: impl Into<String>) -> Self {
        Self {
            client,
            subject: subject.into(),
        }
    }
}

#[async_trait::async_trait]
impl AnalysisGenerator for NatsAnalysisGenerator {
    async fn analyze(&self, session_id: &str) -> Result<String> {
        let request = AnalyzeRequest {
            session_id: session_id.to_string(),
        };

        let reply: AnalyzeReply = self.client.request_json(&self.subject, &request).await?;
        if let Some(error) = reply.error {
            bail!("analysis generator returned error: {}", error);
        }

        reply
            .report_ref
            .context("analysis reply has no report reference")
    }
}
