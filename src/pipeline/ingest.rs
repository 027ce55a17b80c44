use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::engine::{TurnSource, VoicePipeline};
use crate::error::{Port, PortError};
use crate::speech::{
    EnergyVad, EnergyVadConfig, RecognizerConfig, RecognizerEvent, RecognizerSession,
    SpeechRecognizer,
};

/// Configuration for audio ingestion
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Sample rate of the PCM clients send
    pub sample_rate: u32,
    /// Derive VAD events locally from PCM energy
    pub local_vad: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            local_vad: false,
        }
    }
}

/// One open recognizer stream
struct ActiveStream {
    session: Arc<dyn RecognizerSession>,
    pump: JoinHandle<()>,
    vad: Option<EnergyVad>,
}

/// Per-session stream slot. Its lock is held while the stream is being opened,
/// so frames for one session wait for that session's recognizer only.
#[derive(Default)]
struct StreamSlot {
    stream: Option<ActiveStream>,
    /// Removed from the map; a new slot must be taken
    closed: bool,
}

type SlotHandle = Arc<Mutex<StreamSlot>>;

/// Bridges client audio to the recognizer and recognizer events to the pipeline.
///
/// One stream per session, opened on the first frame and closed when the
/// session loses its last connection. The map lock is never held across a
/// recognizer call.
#[derive(Clone)]
pub struct AudioIngest {
    recognizer: Arc<dyn SpeechRecognizer>,
    pipeline: VoicePipeline,
    streams: Arc<Mutex<HashMap<String, SlotHandle>>>,
    config: IngestConfig,
}

impl AudioIngest {
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        pipeline: VoicePipeline,
        config: IngestConfig,
    ) -> Self {
        Self {
            recognizer,
            pipeline,
            streams: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    async fn slot(&self, session_id: &str) -> SlotHandle {
        let mut streams = self.streams.lock().await;
        Arc::clone(streams.entry(session_id.to_string()).or_default())
    }

    /// Feed a PCM frame for a session, starting its recognizer stream if needed
    pub async fn feed(&self, session_id: &str, pcm: &[u8]) -> Result<(), PortError> {
        if pcm.is_empty() {
            return Ok(());
        }

        let (session, vad_event) = loop {
            let slot = self.slot(session_id).await;
            let mut guard = slot.lock().await;
            if guard.closed {
                drop(guard);
                self.forget(session_id, &slot).await;
                continue;
            }

            if guard.stream.is_none() {
                match self.open_stream(session_id, &slot).await {
                    Ok(stream) => guard.stream = Some(stream),
                    Err(e) => {
                        guard.closed = true;
                        drop(guard);
                        self.forget(session_id, &slot).await;
                        return Err(e);
                    }
                }
            }

            let Some(stream) = guard.stream.as_mut() else {
                return Ok(());
            };
            let vad_event = stream.vad.as_mut().and_then(|vad| vad.analyze(pcm));
            break (Arc::clone(&stream.session), vad_event);
        };

        if let Some(event) = vad_event {
            dispatch(&self.pipeline, session_id, event).await;
        }

        session.feed(pcm).await.map_err(|e| {
            let err = PortError::new(Port::Recognizer, &e);
            error!("Failed to feed audio for session {}: {}", session_id, err);
            err
        })
    }

    async fn open_stream(
        &self,
        session_id: &str,
        slot: &SlotHandle,
    ) -> Result<ActiveStream, PortError> {
        info!(
            "Starting {} recognizer stream for session {}",
            self.recognizer.name(),
            session_id
        );

        let config = RecognizerConfig::new(session_id, self.config.sample_rate);
        let stream = self
            .recognizer
            .start(config)
            .await
            .map_err(|e| PortError::new(Port::Recognizer, &e))?;

        let pump = tokio::spawn(pump_events(
            self.clone(),
            session_id.to_string(),
            Arc::clone(slot),
            stream.events,
        ));

        let vad = self.config.local_vad.then(|| {
            EnergyVad::new(EnergyVadConfig {
                sample_rate: self.config.sample_rate,
                ..Default::default()
            })
        });

        Ok(ActiveStream {
            session: Arc::from(stream.session),
            pump,
            vad,
        })
    }

    /// Drop the session's map entry if it still points at `slot`
    async fn forget(&self, session_id: &str, slot: &SlotHandle) {
        let mut streams = self.streams.lock().await;
        if streams
            .get(session_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
        {
            streams.remove(session_id);
        }
    }

    /// Close the session's recognizer stream, if any
    pub async fn release(&self, session_id: &str) {
        let Some(slot) = self.streams.lock().await.remove(session_id) else {
            return;
        };

        // Waits for an open in progress so its stream is stopped too
        let stream = {
            let mut guard = slot.lock().await;
            guard.closed = true;
            guard.stream.take()
        };

        if let Some(stream) = stream {
            info!("Stopping recognizer stream for session {}", session_id);
            stream.pump.abort();
            if let Err(e) = stream.session.stop().await {
                warn!(
                    "Failed to stop recognizer for session {}: {:#}",
                    session_id, e
                );
            }
        }
    }

    pub async fn is_streaming(&self, session_id: &str) -> bool {
        let slot = self.streams.lock().await.get(session_id).cloned();
        match slot {
            Some(slot) => slot.lock().await.stream.is_some(),
            None => false,
        }
    }
}

/// Drain recognizer events for one session in order
async fn pump_events(
    ingest: AudioIngest,
    session_id: String,
    slot: SlotHandle,
    mut events: mpsc::Receiver<RecognizerEvent>,
) {
    debug!("Recognizer pump started for session {}", session_id);

    while let Some(event) = events.recv().await {
        dispatch(&ingest.pipeline, &session_id, event).await;
    }

    info!("Recognizer stream ended for session {}", session_id);
    {
        let mut guard = slot.lock().await;
        guard.closed = true;
        guard.stream = None;
    }
    ingest.forget(&session_id, &slot).await;
}

/// Route one recognizer event to the turn engine
pub async fn dispatch(pipeline: &VoicePipeline, session_id: &str, event: RecognizerEvent) {
    match event {
        RecognizerEvent::Partial(text) => {
            pipeline.on_partial_transcript(session_id, &text).await;
        }
        RecognizerEvent::Final(text) => {
            if let Err(e) = pipeline.submit(session_id, &text, TurnSource::Voice).await {
                debug!("Dropping final transcript for session {}: {}", session_id, e);
            }
        }
        RecognizerEvent::VadBegin => pipeline.on_vad_begin(session_id).await,
        RecognizerEvent::VadEnd => {
            pipeline.on_vad_end(session_id).await;
        }
        RecognizerEvent::Volume(level) => {
            trace!("Session {} input level {:.2}", session_id, level);
        }
        RecognizerEvent::Error(message) => {
            let err = PortError {
                port: Port::Recognizer,
                message,
            };
            pipeline.report_port_error(session_id, &err).await;
        }
    }
}
