use anyhow::{Context, Result};
use async_nats::Client;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use super::messages::AudioFrameMessage;

/// Thin wrapper over the NATS connection shared by every port adapter
#[derive(Clone)]
pub struct NatsClient {
    client: Client,
    request_timeout: Duration,
}

impl NatsClient {
    /// Connect to NATS server
    pub async fn connect(url: &str, request_timeout: Duration) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self {
            client,
            request_timeout,
        })
    }

    /// Publish one PCM frame for a session's recognizer
    pub async fn publish_audio_frame(
        &self,
        session_id: &str,
        pcm_bytes: &[u8],
        sample_rate: u32,
        sequence: u32,
        is_final: bool,
    ) -> Result<()> {
        let subject = format!("audio.frame.{}", session_id);

        let message = AudioFrameMessage {
            session_id: session_id.to_string(),
            sequence,
            pcm: base64::engine::general_purpose::STANDARD.encode(pcm_bytes),
            sample_rate,
            channels: 1,
            timestamp: chrono::Utc::now().to_rfc3339(),
            final_frame: is_final,
        };

        let payload = serde_json::to_vec(&message)?;

        self.client
            .publish(subject.clone(), payload.into())
            .await
            .context("Failed to publish audio frame")?;

        debug!(
            "Published audio frame to {} (seq={}, bytes={}, final={})",
            subject,
            sequence,
            pcm_bytes.len(),
            is_final
        );

        Ok(())
    }

    /// Subscribe to transcript messages
    pub async fn subscribe_transcripts(&self) -> Result<async_nats::Subscriber> {
        // The STT service publishes to stt.text.partial and stt.text.final;
        // callers filter by session_id in the payload.
        self.subscribe("stt.text.>").await
    }

    /// Subscribe to voice activity messages
    pub async fn subscribe_vad(&self) -> Result<async_nats::Subscriber> {
        self.subscribe("stt.vad.>").await
    }

    async fn subscribe(&self, subject: &'static str) -> Result<async_nats::Subscriber> {
        info!("Subscribing to {}", subject);

        self.client
            .subscribe(subject.to_string())
            .await
            .with_context(|| format!("Failed to subscribe to {}", subject))
    }

    /// JSON request/reply bounded by the configured timeout
    pub async fn request_json<Req, Rep>(&self, subject: &str, request: &Req) -> Result<Rep>
    where
        Req: Serialize,
        Rep: DeserializeOwned,
    {
        let payload = serde_json::to_vec(request)?;

        let reply = tokio::time::timeout(
            self.request_timeout,
            self.client.request(subject.to_string(), payload.into()),
        )
        .await
        .with_context(|| format!("Request to {} timed out", subject))?
        .with_context(|| format!("Request to {} failed", subject))?;

        serde_json::from_slice(&reply.payload)
            .with_context(|| format!("Invalid reply from {}", subject))
    }

    /// Flush pending publishes before shutdown
    pub async fn close(&self) -> Result<()> {
        info!("Closing NATS connection");
        self.client
            .flush()
            .await
            .context("Failed to flush NATS connection")
    }
}
