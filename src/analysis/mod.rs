//! Asynchronous post-interview analysis
//!
//! Tasks are queued when an interview completes and processed one at a time
//! by a background worker that calls the external `AnalysisGenerator`.

mod generator;
mod queue;
mod store;
mod task;

pub use generator::AnalysisGenerator;
pub use queue::AnalysisQueue;
pub use store::{InMemoryTaskStore, TaskStore};
pub use task::{AnalysisTask, QueueStats, TaskStatus};
