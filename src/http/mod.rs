//! HTTP surface of the interview service
//!
//! - GET /ws - Realtime interview connection (WebSocket)
//! - GET /sessions/:id/status - Session status snapshot
//! - GET /sessions/:id/transcript - Transcript so far
//! - POST /sessions/:id/analysis - Queue the post-interview report
//! - GET /sessions/:id/analysis - Latest report task
//! - POST /sessions/:id/analysis/retry - Retry a failed report
//! - GET /analysis/stats - Queue counters
//! - GET /health - Health check

mod handlers;
mod routes;
mod socket;
mod state;

pub use handlers::{AnalysisView, EnqueueAnalysisRequest, ErrorResponse};
pub use routes::create_router;
pub use state::AppState;
