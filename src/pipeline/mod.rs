//! Voice pipeline (turn engine)
//!
//! IDLE → LISTENING → THINKING → SPEAKING → LISTENING, with barge-in from
//! SPEAKING straight back to LISTENING. `AudioIngest` feeds client audio to
//! the recognizer and routes its events into the engine.

mod engine;
mod ingest;
mod turn;

pub use engine::{opening_line, TurnOutcome, TurnSource, TurnStart, VoicePipeline};
pub use ingest::{dispatch, AudioIngest, IngestConfig};
pub use turn::{TurnState, TurnTracker};
