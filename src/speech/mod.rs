//! Speech ports consumed by the voice pipeline
//!
//! - `SpeechRecognizer`: streaming ASR, yields `RecognizerEvent`s over a channel
//! - `SpeechSynthesizer`: text to audio reference + duration, or client-side speech
//! - `ConversationalResponder`: candidate utterance + context to interviewer reply
//! - `EnergyVad`: local voice activity fallback

pub mod recognizer;
pub mod responder;
pub mod synthesizer;
pub mod vad;

pub use recognizer::{
    RecognitionStream, RecognizerConfig, RecognizerEvent, RecognizerSession, SpeechRecognizer,
};
pub use responder::{ConversationalResponder, ResponderContext};
pub use synthesizer::{ClientSideSynthesizer, SpeechSynthesizer, Synthesis};
pub use vad::{EnergyVad, EnergyVadConfig, VadState};
