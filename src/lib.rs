pub mod analysis;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod nats;
pub mod pipeline;
pub mod session;
pub mod speech;

pub use analysis::{
    AnalysisGenerator, AnalysisQueue, AnalysisTask, InMemoryTaskStore, QueueStats, TaskStatus,
    TaskStore,
};
pub use config::{Config, TtsMode};
pub use error::{GatewayError, Port, PortError, QueueError, ValidationError};
pub use gateway::{InboundEvent, OutboundEvent, Outbox, RealtimeGateway};
pub use http::{create_router, AppState};
pub use nats::{NatsAnalysisGenerator, NatsClient, NatsRecognizer, NatsResponder, NatsSynthesizer};
pub use pipeline::{AudioIngest, IngestConfig, TurnOutcome, TurnSource, TurnStart, TurnState, VoicePipeline};
pub use session::{ConnectionId, SessionMeta, SessionRegistry, SessionStatus, Speaker, Utterance};
pub use speech::{
    ClientSideSynthesizer, ConversationalResponder, RecognizerEvent, SpeechRecognizer,
    SpeechSynthesizer, Synthesis,
};
