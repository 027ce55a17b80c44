use base64::Engine;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::events::{InboundEvent, OutboundEvent};
use super::outbox::Outbox;
use crate::analysis::AnalysisQueue;
use crate::error::{GatewayError, ValidationError};
use crate::pipeline::{AudioIngest, TurnSource, TurnStart, VoicePipeline};
use crate::session::{ConnectionId, SessionMeta, SessionRegistry};

/// Accepts client connections, binds them to sessions and routes their events.
///
/// A connection is bound to at most one session at a time. Everything a
/// connection does wrong is reported to that connection only.
#[derive(Clone)]
pub struct RealtimeGateway {
    registry: SessionRegistry,
    outbox: Outbox,
    pipeline: VoicePipeline,
    ingest: AudioIngest,
    queue: AnalysisQueue,
    bindings: Arc<RwLock<HashMap<ConnectionId, String>>>,
}

impl RealtimeGateway {
    pub fn new(
        registry: SessionRegistry,
        outbox: Outbox,
        pipeline: VoicePipeline,
        ingest: AudioIngest,
        queue: AnalysisQueue,
    ) -> Self {
        Self {
            registry,
            outbox,
            pipeline,
            ingest,
            queue,
            bindings: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn pipeline(&self) -> &VoicePipeline {
        &self.pipeline
    }

    pub fn queue(&self) -> &AnalysisQueue {
        &self.queue
    }

    /// Open a new connection and return its outbound event queue
    pub async fn connect(&self) -> (ConnectionId, UnboundedReceiver<OutboundEvent>) {
        let connection_id = uuid::Uuid::new_v4();
        let rx = self.outbox.register(connection_id).await;
        info!("Connection {} opened", connection_id);
        (connection_id, rx)
    }

    /// Session the connection is bound to, if any
    pub async fn bound_session(&self, connection_id: ConnectionId) -> Option<String> {
        self.bindings.read().await.get(&connection_id).cloned()
    }

    /// Bind a connection to a session. Returns whether it is the session's first active binding.
    pub async fn bind_connection(
        &self,
        connection_id: ConnectionId,
        session_id: &str,
        meta: SessionMeta,
    ) -> Result<bool, GatewayError> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(ValidationError::EmptySessionId.into());
        }

        if let Some(previous) = self.bound_session(connection_id).await {
            if previous != session_id {
                info!(
                    "Connection {} moving from session {} to {}",
                    connection_id, previous, session_id
                );
                self.unbind_connection(connection_id, "rebind").await;
            }
        }

        let outcome = self.registry.bind(session_id, connection_id, meta).await;
        self.bindings
            .write()
            .await
            .insert(connection_id, session_id.to_string());

        info!(
            "Connection {} joined session {} (first_binding={})",
            connection_id, session_id, outcome.first_binding
        );
        Ok(outcome.first_binding)
    }

    /// Remove a connection from its session. Returns the session it was bound to.
    pub async fn unbind_connection(
        &self,
        connection_id: ConnectionId,
        reason: &str,
    ) -> Option<String> {
        let session_id = self.bindings.write().await.remove(&connection_id)?;

        let now_empty = self.registry.unbind(&session_id, connection_id).await;
        info!(
            "Connection {} left session {} ({})",
            connection_id, session_id, reason
        );

        if now_empty {
            self.ingest.release(&session_id).await;
            debug!(
                "Session {} has no connections, cleanup in {:?}",
                session_id,
                self.registry.retention()
            );
        }

        Some(session_id)
    }

    /// Transport closed: unbind and drop the outbound queue
    pub async fn disconnect(&self, connection_id: ConnectionId, reason: &str) {
        self.unbind_connection(connection_id, reason).await;
        self.outbox.unregister(connection_id).await;
        info!("Connection {} closed ({})", connection_id, reason);
    }

    /// Fan an event out to every connection bound to the session
    pub async fn broadcast(&self, session_id: &str, event: &OutboundEvent) -> usize {
        let connections = self.registry.connections(session_id).await;
        self.outbox.deliver(&connections, event).await
    }

    /// Handle a JSON text frame. Never fails; problems go back to the sender.
    pub async fn handle_text(&self, connection_id: ConnectionId, raw: &str) {
        let event = match serde_json::from_str::<InboundEvent>(raw) {
            Ok(event) => event,
            Err(e) => {
                warn!("Malformed event from connection {}: {}", connection_id, e);
                let err = ValidationError::Malformed(e.to_string());
                self.outbox
                    .send(connection_id, OutboundEvent::error(None, err.to_string()))
                    .await;
                return;
            }
        };

        let session_id = event.session_id().to_string();
        if let Err(e) = self.route_inbound(connection_id, event).await {
            warn!("Rejected event from connection {}: {}", connection_id, e);
            let session = Some(session_id.as_str()).filter(|s| !s.is_empty());
            self.outbox
                .send(connection_id, OutboundEvent::error(session, e.to_string()))
                .await;
        }
    }

    /// Handle a binary frame: raw PCM for the connection's bound session
    pub async fn handle_audio(&self, connection_id: ConnectionId, pcm: &[u8]) {
        let Some(session_id) = self.bound_session(connection_id).await else {
            let err = GatewayError::Unbound(connection_id.to_string());
            self.outbox
                .send(connection_id, OutboundEvent::error(None, err.to_string()))
                .await;
            return;
        };

        self.feed_audio(&session_id, pcm).await;
    }

    /// Dispatch one parsed event
    pub async fn route_inbound(
        &self,
        connection_id: ConnectionId,
        event: InboundEvent,
    ) -> Result<(), GatewayError> {
        if let InboundEvent::Join { ref session_id, .. } = event {
            let meta = event.meta();
            let first_binding = self.bind_connection(connection_id, session_id, meta).await?;
            let session_id = session_id.trim();

            self.outbox
                .send(
                    connection_id,
                    OutboundEvent::Joined {
                        session_id: session_id.to_string(),
                    },
                )
                .await;
            self.pipeline.on_join(session_id, first_binding).await;
            return Ok(());
        }

        let session_id = self.require_binding(connection_id, event.session_id()).await?;

        match event {
            InboundEvent::Join { .. } => {}
            InboundEvent::Leave { .. } => {
                self.unbind_connection(connection_id, "leave").await;
            }
            InboundEvent::Text { text, .. } => {
                match self
                    .pipeline
                    .submit(&session_id, &text, TurnSource::Text)
                    .await?
                {
                    TurnStart::Started(_) => {}
                    TurnStart::Ignored => {
                        info!("Text for session {} rejected, turn in progress", session_id);
                        return Err(GatewayError::TurnInProgress(session_id));
                    }
                    TurnStart::UnknownSession => {
                        warn!("Text for purged session {}", session_id)
                    }
                }
            }
            InboundEvent::AudioFrame { pcm, .. } => {
                let pcm = base64::engine::general_purpose::STANDARD
                    .decode(pcm.as_bytes())
                    .map_err(|e| ValidationError::InvalidAudio(e.to_string()))?;
                self.feed_audio(&session_id, &pcm).await;
            }
            InboundEvent::Interrupt { .. } => {
                self.pipeline.on_interrupt(&session_id).await;
            }
            InboundEvent::StatusQuery { .. } => {
                let status = self.pipeline.status(&session_id).await;
                self.outbox
                    .send(connection_id, OutboundEvent::Status(status))
                    .await;
            }
            InboundEvent::PlaybackFinished { .. } => {
                self.pipeline.on_playback_finished(&session_id).await;
            }
            InboundEvent::Complete { .. } => match self.queue.enqueue(&session_id, None).await {
                Ok(task) => {
                    let event = OutboundEvent::AnalysisQueued {
                        session_id: session_id.clone(),
                        task_id: task.id,
                    };
                    self.broadcast(&session_id, &event).await;
                }
                Err(e) => {
                    self.outbox
                        .send(
                            connection_id,
                            OutboundEvent::error(Some(&session_id), e.to_string()),
                        )
                        .await;
                }
            },
        }

        Ok(())
    }

    /// Session a non-join event may act on: the connection's own binding
    async fn require_binding(
        &self,
        connection_id: ConnectionId,
        requested: &str,
    ) -> Result<String, GatewayError> {
        let requested = requested.trim();
        let Some(bound) = self.bound_session(connection_id).await else {
            return Err(GatewayError::Unbound(connection_id.to_string()));
        };

        if !requested.is_empty() && requested != bound {
            return Err(GatewayError::SessionMismatch {
                bound,
                requested: requested.to_string(),
            });
        }

        self.registry.touch(&bound).await;
        Ok(bound)
    }

    async fn feed_audio(&self, session_id: &str, pcm: &[u8]) {
        if let Err(e) = self.ingest.feed(session_id, pcm).await {
            self.pipeline.report_port_error(session_id, &e).await;
        }
    }
}
