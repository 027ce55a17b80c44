use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::turn::TurnState;
use crate::config::{RealtimeConfig, TtsMode};
use crate::error::{Port, PortError, ValidationError};
use crate::gateway::{OutboundEvent, Outbox};
use crate::session::{SessionHandle, SessionRegistry, SessionStatus, Utterance};
use crate::speech::{
    ConversationalResponder, ResponderContext, SpeechSynthesizer, Synthesis, VadState,
};

/// Where a candidate utterance came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnSource {
    Voice,
    Text,
}

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Reply delivered to the session
    Replied,
    /// An interrupt or newer turn made the result stale; nothing was emitted
    Superseded,
    /// A port failed; an error event was emitted and the session is listening again
    Failed,
    /// A turn was already thinking or speaking
    Ignored,
    UnknownSession,
}

/// Result of submitting a final transcript without waiting for the reply
#[derive(Debug)]
pub enum TurnStart {
    Started(JoinHandle<TurnOutcome>),
    Ignored,
    UnknownSession,
}

/// A turn that has entered THINKING and still needs its port calls
struct PendingTurn {
    session_id: String,
    handle: SessionHandle,
    generation: u64,
    text: String,
    source: TurnSource,
    context: ResponderContext,
}

enum Begin {
    Ready(PendingTurn),
    Ignored,
    UnknownSession,
}

/// Scripted opening line, personalised with the job position
pub fn opening_line(job_position: Option<&str>) -> String {
    let position = job_position
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or("这个职位");

    format!(
        "非常荣幸认识您，我会陪您完成接下来的面试流程。\
         我们先做个开场：请简单介绍一下您自己，并说明为什么想要应聘{}。",
        position
    )
}

/// Per-session turn engine: recognizer output in, responder + synthesizer, events out.
///
/// State lives in the registry entry. Every port call happens with the entry
/// unlocked, and its result is applied only if the turn generation still matches.
#[derive(Clone)]
pub struct VoicePipeline {
    registry: SessionRegistry,
    outbox: Outbox,
    responder: Arc<dyn ConversationalResponder>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    infer_final_on_vad_end: bool,
}

impl VoicePipeline {
    pub fn new(
        registry: SessionRegistry,
        outbox: Outbox,
        responder: Arc<dyn ConversationalResponder>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        config: &RealtimeConfig,
    ) -> Self {
        Self {
            registry,
            outbox,
            responder,
            synthesizer,
            infer_final_on_vad_end: config.infer_final_on_vad_end,
        }
    }

    /// Move the session to listening and, on its first binding, send the opening line once.
    ///
    /// Returns whether the welcome was sent.
    pub async fn on_join(&self, session_id: &str, first_binding: bool) -> bool {
        let Some(handle) = self.registry.get(session_id).await else {
            warn!("Join for unknown session {}", session_id);
            return false;
        };

        let mut entry = handle.lock().await;
        if entry.turn.state == TurnState::Idle {
            entry.turn.state = TurnState::Listening;
        }

        if !first_binding {
            debug!(
                "Session {} already has connections, not sending welcome",
                session_id
            );
            return false;
        }

        let text = opening_line(entry.session.meta.job_position.as_deref());
        if !self.registry.claim_welcome(&mut entry, &text).await {
            return false;
        }

        // Spoken by the client so it is on the wire before any turn content.
        entry.session.transcript.push(Utterance::system(&text, None));
        let event = OutboundEvent::Utterance {
            session_id: session_id.to_string(),
            text,
            audio_ref: None,
            duration_ms: 0,
            tts_mode: TtsMode::Client,
            is_welcome: true,
            user_text: None,
        };
        let delivered = self
            .outbox
            .deliver(&entry.connection.connections, &event)
            .await;

        info!(
            "Sent welcome for session {} to {} connection(s)",
            session_id, delivered
        );
        true
    }

    /// Forward an interim transcript as a live caption
    pub async fn on_partial_transcript(&self, session_id: &str, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let Some(handle) = self.registry.get(session_id).await else {
            return;
        };

        let mut entry = handle.lock().await;
        entry.turn.pending_partial = Some(text.to_string());
        let event = OutboundEvent::PartialTranscript {
            session_id: session_id.to_string(),
            text: text.to_string(),
        };
        self.outbox
            .deliver(&entry.connection.connections, &event)
            .await;
    }

    /// Run a full turn for a recognizer final and wait for its outcome
    pub async fn on_final_transcript(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<TurnOutcome, ValidationError> {
        self.run_now(session_id, text, TurnSource::Voice).await
    }

    /// Run a full turn for a typed message and wait for its outcome
    pub async fn on_text_message(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<TurnOutcome, ValidationError> {
        self.run_now(session_id, text, TurnSource::Text).await
    }

    /// Validate and start a turn, leaving the port calls to a spawned task.
    ///
    /// Callers that must keep reading events (socket loops, recognizer pumps)
    /// use this so an interrupt can arrive while the responder is working.
    pub async fn submit(
        &self,
        session_id: &str,
        text: &str,
        source: TurnSource,
    ) -> Result<TurnStart, ValidationError> {
        Ok(match self.begin_turn(session_id, text, source).await? {
            Begin::Ready(turn) => TurnStart::Started(tokio::spawn(self.clone().run_turn(turn))),
            Begin::Ignored => TurnStart::Ignored,
            Begin::UnknownSession => TurnStart::UnknownSession,
        })
    }

    async fn run_now(
        &self,
        session_id: &str,
        text: &str,
        source: TurnSource,
    ) -> Result<TurnOutcome, ValidationError> {
        Ok(match self.begin_turn(session_id, text, source).await? {
            Begin::Ready(turn) => self.clone().run_turn(turn).await,
            Begin::Ignored => TurnOutcome::Ignored,
            Begin::UnknownSession => TurnOutcome::UnknownSession,
        })
    }

    async fn begin_turn(
        &self,
        session_id: &str,
        text: &str,
        source: TurnSource,
    ) -> Result<Begin, ValidationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyText);
        }

        let Some(handle) = self.registry.get(session_id).await else {
            return Ok(Begin::UnknownSession);
        };

        let mut entry = handle.lock().await;
        if !entry.turn.accepts_final() {
            info!(
                "Ignoring final transcript for session {} while {:?}",
                session_id, entry.turn.state
            );
            return Ok(Begin::Ignored);
        }

        let context = ResponderContext::from_session(&entry.session);
        let generation = entry.turn.begin();
        entry.session.transcript.push(Utterance::user(text));
        entry.connection.touch();

        info!(
            "Session {} turn {} thinking ({:?}): {}",
            session_id, generation, source, text
        );

        Ok(Begin::Ready(PendingTurn {
            session_id: session_id.to_string(),
            handle: Arc::clone(&handle),
            generation,
            text: text.to_string(),
            source,
            context,
        }))
    }

    async fn run_turn(self, turn: PendingTurn) -> TurnOutcome {
        let PendingTurn {
            session_id,
            handle,
            generation,
            text,
            source,
            context,
        } = turn;

        let reply = match self.responder.respond(&session_id, &text, &context).await {
            Ok(reply) => reply,
            Err(e) => {
                let err = PortError::new(Port::Responder, &e);
                return self
                    .fail_turn(&session_id, &handle, generation, TurnState::Thinking, err)
                    .await;
            }
        };

        {
            let mut entry = handle.lock().await;
            if !entry.turn.is_current(generation, TurnState::Thinking) {
                info!(
                    "Discarding stale reply for session {} turn {}",
                    session_id, generation
                );
                return TurnOutcome::Superseded;
            }
            entry.turn.state = TurnState::Speaking;
        }

        let synthesis = match self.synthesizer.synthesize(&session_id, &reply).await {
            Ok(synthesis) => synthesis,
            Err(e) => {
                let err = PortError::new(Port::Synthesizer, &e);
                return self
                    .fail_turn(&session_id, &handle, generation, TurnState::Speaking, err)
                    .await;
            }
        };

        let mut entry = handle.lock().await;
        if !entry.turn.is_current(generation, TurnState::Speaking) {
            info!(
                "Discarding synthesis for interrupted turn {} of session {}",
                generation, session_id
            );
            return TurnOutcome::Superseded;
        }

        entry
            .session
            .transcript
            .push(Utterance::system(&reply, synthesis.audio_ref.clone()));

        let event = utterance_event(&session_id, reply, &synthesis, source, text);
        self.outbox
            .deliver(&entry.connection.connections, &event)
            .await;

        let timer = tokio::spawn(finish_playback(
            Arc::clone(&handle),
            generation,
            synthesis.duration,
        ));
        entry.turn.set_playback(timer);

        info!(
            "Session {} turn {} speaking for {:?}",
            session_id, generation, synthesis.duration
        );
        TurnOutcome::Replied
    }

    async fn fail_turn(
        &self,
        session_id: &str,
        handle: &SessionHandle,
        generation: u64,
        expected: TurnState,
        err: PortError,
    ) -> TurnOutcome {
        let mut entry = handle.lock().await;
        if !entry.turn.is_current(generation, expected) {
            warn!(
                "Ignoring {} for superseded turn {} of session {}",
                err, generation, session_id
            );
            return TurnOutcome::Superseded;
        }

        error!("Turn {} of session {} failed: {}", generation, session_id, err);
        entry.turn.state = TurnState::Listening;

        let event = OutboundEvent::error(Some(session_id), err.to_string());
        self.outbox
            .deliver(&entry.connection.connections, &event)
            .await;
        TurnOutcome::Failed
    }

    /// Barge-in. Only meaningful while speaking; returns whether it took effect.
    pub async fn on_interrupt(&self, session_id: &str) -> bool {
        let Some(handle) = self.registry.get(session_id).await else {
            return false;
        };

        let mut entry = handle.lock().await;
        if !entry.turn.interrupt() {
            debug!(
                "Interrupt ignored for session {} in state {:?}",
                session_id, entry.turn.state
            );
            return false;
        }

        info!("Session {} interrupted by candidate", session_id);
        let event = OutboundEvent::Interrupted {
            session_id: session_id.to_string(),
        };
        self.outbox
            .deliver(&entry.connection.connections, &event)
            .await;
        true
    }

    /// Client reports the assistant utterance finished playing
    pub async fn on_playback_finished(&self, session_id: &str) -> bool {
        let Some(handle) = self.registry.get(session_id).await else {
            return false;
        };

        let mut entry = handle.lock().await;
        if entry.turn.state != TurnState::Speaking || !entry.turn.playback_armed() {
            return false;
        }

        entry.turn.cancel_playback();
        entry.turn.state = TurnState::Listening;
        debug!("Session {} playback finished, listening", session_id);
        true
    }

    pub async fn on_vad_begin(&self, session_id: &str) {
        if let Some(handle) = self.registry.get(session_id).await {
            handle.lock().await.vad = VadState::Speaking;
        }
    }

    /// Mark silence. With boundary inference on, a pending partial becomes the final.
    pub async fn on_vad_end(&self, session_id: &str) -> Option<TurnStart> {
        let handle = self.registry.get(session_id).await?;

        let inferred = {
            let mut entry = handle.lock().await;
            entry.vad = VadState::Silence;
            if self.infer_final_on_vad_end && entry.turn.accepts_final() {
                entry.turn.pending_partial.take()
            } else {
                None
            }
        }?;

        debug!(
            "Inferring final transcript from VAD end for session {}",
            session_id
        );
        self.submit(session_id, &inferred, TurnSource::Voice).await.ok()
    }

    /// Surface a port failure that is not tied to a turn
    pub async fn report_port_error(&self, session_id: &str, err: &PortError) {
        let Some(handle) = self.registry.get(session_id).await else {
            return;
        };

        warn!("Session {}: {}", session_id, err);
        let entry = handle.lock().await;
        let event = OutboundEvent::error(Some(session_id), err.to_string());
        self.outbox
            .deliver(&entry.connection.connections, &event)
            .await;
    }

    pub async fn status(&self, session_id: &str) -> SessionStatus {
        self.registry.status(session_id).await
    }
}

fn utterance_event(
    session_id: &str,
    reply: String,
    synthesis: &Synthesis,
    source: TurnSource,
    user_text: String,
) -> OutboundEvent {
    OutboundEvent::Utterance {
        session_id: session_id.to_string(),
        text: reply,
        audio_ref: synthesis.audio_ref.clone(),
        duration_ms: synthesis.duration.as_millis() as u64,
        tts_mode: if synthesis.is_client_side() {
            TtsMode::Client
        } else {
            TtsMode::Server
        },
        is_welcome: false,
        user_text: match source {
            TurnSource::Voice => Some(user_text),
            TurnSource::Text => None,
        },
    }
}

/// Return to listening once playback should be over, unless the turn moved on
async fn finish_playback(handle: SessionHandle, generation: u64, duration: Duration) {
    tokio::time::sleep(duration).await;

    let mut entry = handle.lock().await;
    if entry.turn.is_current(generation, TurnState::Speaking) {
        entry.turn.clear_playback();
        entry.turn.state = TurnState::Listening;
    }
}
