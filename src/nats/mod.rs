pub mod client;
pub mod messages;
pub mod ports;

pub use client::NatsClient;
pub use messages::{AudioFrameMessage, TranscriptMessage, VadKind, VadMessage};
pub use ports::{NatsAnalysisGenerator, NatsRecognizer, NatsResponder, NatsSynthesizer};
