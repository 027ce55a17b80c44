// Shared fakes for integration tests
//
// Every external port is replaced by a scripted in-process fake so the
// gateway, pipeline and queue can be driven deterministically under a
// paused tokio clock.

#![allow(dead_code)]

use aimian_realtime::analysis::{AnalysisGenerator, AnalysisQueue, InMemoryTaskStore};
use aimian_realtime::config::{AnalysisConfig, RealtimeConfig};
use aimian_realtime::gateway::{OutboundEvent, Outbox, RealtimeGateway};
use aimian_realtime::pipeline::{AudioIngest, IngestConfig, VoicePipeline};
use aimian_realtime::session::SessionRegistry;
use aimian_realtime::speech::{
    ConversationalResponder, RecognitionStream, RecognizerConfig, RecognizerEvent,
    RecognizerSession, ResponderContext, SpeechRecognizer, SpeechSynthesizer, Synthesis,
};
use anyhow::{anyhow, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::Notify;

pub const REPLY: &str = "谢谢分享。能具体说说您在上一个项目里负责的模块吗？";

/// Responder that returns a fixed reply, optionally failing or waiting for a release
#[derive(Default)]
pub struct ScriptedResponder {
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<String>>,
    pub fail: AtomicBool,
    hold: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedResponder {
    /// Make subsequent calls wait until the returned notify fires
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.hold.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ConversationalResponder for ScriptedResponder {
    async fn respond(
        &self,
        _session_id: &str,
        text: &str,
        _context: &ResponderContext,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(text.to_string());

        let gate = self.hold.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("model unavailable"));
        }
        Ok(REPLY.to_string())
    }
}

/// Synthesizer returning a server-side audio reference of fixed length
pub struct ScriptedSynthesizer {
    pub calls: AtomicUsize,
    pub duration: Duration,
    pub fail: AtomicBool,
    hold: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedSynthesizer {
    pub fn new(duration: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            duration,
            fail: AtomicBool::new(false),
            hold: Mutex::new(None),
        }
    }

    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.hold.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for ScriptedSynthesizer {
    async fn synthesize(&self, session_id: &str, _text: &str) -> Result<Synthesis> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.hold.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("voice engine offline"));
        }
        Ok(Synthesis {
            audio_ref: Some(format!("tts://{}/{}", session_id, n)),
            duration: self.duration,
        })
    }
}

/// Recognizer whose event streams are driven by the test
#[derive(Default)]
pub struct FakeRecognizer {
    streams: Mutex<HashMap<String, mpsc::Sender<RecognizerEvent>>>,
    start_gates: Mutex<HashMap<String, Arc<Notify>>>,
    pub fed: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    pub stopped: Arc<Mutex<Vec<String>>>,
}

impl FakeRecognizer {
    /// Make `start` for this session wait until the returned notify fires
    pub fn hold_start(&self, session_id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.start_gates
            .lock()
            .unwrap()
            .insert(session_id.to_string(), Arc::clone(&gate));
        gate
    }

    /// Push an event into the open stream of a session
    pub async fn emit(&self, session_id: &str, event: RecognizerEvent) -> Result<()> {
        let tx = self
            .streams
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| anyhow!("no recognizer stream for {}", session_id))?;
        tx.send(event).await?;
        Ok(())
    }

    pub fn fed_bytes(&self, session_id: &str) -> usize {
        self.fed
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == session_id)
            .map(|(_, pcm)| pcm.len())
            .sum()
    }
}

struct FakeRecognizerSession {
    session_id: String,
    fed: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    stopped: Arc<Mutex<Vec<String>>>,
}

#[async_trait::async_trait]
impl SpeechRecognizer for FakeRecognizer {
    async fn start(&self, config: RecognizerConfig) -> Result<RecognitionStream> {
        let gate = self.start_gates.lock().unwrap().remove(&config.session_id);
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let (tx, rx) = mpsc::channel(100);
        self.streams
            .lock()
            .unwrap()
            .insert(config.session_id.clone(), tx);

        Ok(RecognitionStream {
            session: Box::new(FakeRecognizerSession {
                session_id: config.session_id,
                fed: Arc::clone(&self.fed),
                stopped: Arc::clone(&self.stopped),
            }),
            events: rx,
        })
    }

    fn name(&self) -> &str {
        "fake"
    }
}

#[async_trait::async_trait]
impl RecognizerSession for FakeRecognizerSession {
    async fn feed(&self, pcm: &[u8]) -> Result<()> {
        self.fed
            .lock()
            .unwrap()
            .push((self.session_id.clone(), pcm.to_vec()));
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.stopped.lock().unwrap().push(self.session_id.clone());
        Ok(())
    }
}

/// Generator that plays back scripted outcomes per session, succeeding once the script runs out
#[derive(Default)]
pub struct ScriptedGenerator {
    scripts: Mutex<HashMap<String, VecDeque<Result<String, String>>>>,
    pub always_fail: Mutex<Vec<String>>,
    pub calls: Mutex<Vec<String>>,
    hold: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedGenerator {
    /// Make the next analysis wait until the returned notify fires
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.hold.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn fail_times(&self, session_id: &str, times: usize) {
        let mut scripts = self.scripts.lock().unwrap();
        let script = scripts.entry(session_id.to_string()).or_default();
        for i in 0..times {
            script.push_back(Err(format!("scorer error #{}", i + 1)));
        }
    }

    pub fn fail_always(&self, session_id: &str) {
        self.always_fail.lock().unwrap().push(session_id.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AnalysisGenerator for ScriptedGenerator {
    async fn analyze(&self, session_id: &str) -> Result<String> {
        self.calls.lock().unwrap().push(session_id.to_string());

        let gate = self.hold.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.always_fail.lock().unwrap().iter().any(|s| s == session_id) {
            return Err(anyhow!("scorer rejected {}", session_id));
        }

        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(session_id)
            .and_then(|script| script.pop_front());

        match next {
            Some(Err(message)) => Err(anyhow!(message)),
            Some(Ok(report)) => Ok(report),
            None => Ok(format!("report://{}", session_id)),
        }
    }
}

/// Fully wired service with fake ports
pub struct Harness {
    pub registry: SessionRegistry,
    pub outbox: Outbox,
    pub pipeline: VoicePipeline,
    pub ingest: AudioIngest,
    pub queue: AnalysisQueue,
    pub gateway: RealtimeGateway,
    pub responder: Arc<ScriptedResponder>,
    pub synthesizer: Arc<ScriptedSynthesizer>,
    pub recognizer: Arc<FakeRecognizer>,
    pub generator: Arc<ScriptedGenerator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(RealtimeConfig::default(), AnalysisConfig::default())
    }

    pub fn with_config(realtime: RealtimeConfig, analysis: AnalysisConfig) -> Self {
        let registry =
            SessionRegistry::new(realtime.session_retention(), realtime.welcome_cooldown());
        let outbox = Outbox::new();
        let responder = Arc::new(ScriptedResponder::default());
        let synthesizer = Arc::new(ScriptedSynthesizer::new(Duration::from_secs(10)));
        let recognizer = Arc::new(FakeRecognizer::default());
        let generator = Arc::new(ScriptedGenerator::default());

        let pipeline = VoicePipeline::new(
            registry.clone(),
            outbox.clone(),
            responder.clone(),
            synthesizer.clone(),
            &realtime,
        );
        let ingest = AudioIngest::new(
            recognizer.clone(),
            pipeline.clone(),
            IngestConfig {
                sample_rate: realtime.sample_rate,
                local_vad: realtime.local_vad,
            },
        );
        let queue = AnalysisQueue::new(
            Arc::new(InMemoryTaskStore::new()),
            generator.clone(),
            analysis,
        );
        let gateway = RealtimeGateway::new(
            registry.clone(),
            outbox.clone(),
            pipeline.clone(),
            ingest.clone(),
            queue.clone(),
        );

        Self {
            registry,
            outbox,
            pipeline,
            ingest,
            queue,
            gateway,
            responder,
            synthesizer,
            recognizer,
            generator,
        }
    }

    /// Open a connection and join it to a session, returning its id and queue
    pub async fn join(
        &self,
        session_id: &str,
    ) -> (aimian_realtime::session::ConnectionId, UnboundedReceiver<OutboundEvent>) {
        let (conn, rx) = self.gateway.connect().await;
        let join = serde_json::json!({
            "type": "join",
            "sessionId": session_id,
            "jobPosition": "后端工程师",
        });
        self.gateway.handle_text(conn, &join.to_string()).await;
        (conn, rx)
    }
}

/// Wait for the next event on a connection
pub async fn next_event(rx: &mut UnboundedReceiver<OutboundEvent>) -> Result<OutboundEvent> {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .map_err(|_| anyhow!("timed out waiting for an event"))?
        .ok_or_else(|| anyhow!("connection queue closed"))
}

/// Everything already queued for a connection
pub fn drain(rx: &mut UnboundedReceiver<OutboundEvent>) -> Vec<OutboundEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Let spawned tasks run without moving the clock
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
