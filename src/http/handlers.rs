use super::state::AppState;
use crate::analysis::AnalysisTask;
use crate::error::QueueError;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct EnqueueAnalysisRequest {
    /// Optional priority (higher runs first; default from config)
    pub priority: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisView {
    /// processing | ready | failed
    pub state: &'static str,
    pub task: AnalysisTask,
}

impl From<AnalysisTask> for AnalysisView {
    fn from(task: AnalysisTask) -> Self {
        Self {
            state: task.status.report_state(),
            task,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

fn queue_error(err: QueueError) -> Response {
    match err {
        QueueError::NotFound(_) => error_response(StatusCode::NOT_FOUND, err.to_string()),
        QueueError::Store(_) => {
            error!("Analysis store error: {}", err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /sessions/:session_id/status
/// Snapshot of the session's turn, VAD and connection state
pub async fn get_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let status = state.gateway.pipeline().status(&session_id).await;
    (StatusCode::OK, Json(status))
}

/// GET /sessions/:session_id/transcript
/// Ordered utterances so far
pub async fn get_session_transcript(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.registry().transcript(&session_id).await {
        Some(transcript) => (StatusCode::OK, Json(transcript)).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Session {} not found", session_id),
        ),
    }
}

/// POST /sessions/:session_id/analysis
/// Queue the post-interview report. The body is optional; when present it must be valid JSON.
pub async fn enqueue_analysis(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    if session_id.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "sessionId must not be empty".to_string(),
        );
    }

    let req = if body.iter().all(u8::is_ascii_whitespace) {
        EnqueueAnalysisRequest::default()
    } else {
        match serde_json::from_slice::<EnqueueAnalysisRequest>(&body) {
            Ok(req) => req,
            Err(e) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid request body: {}", e),
                )
            }
        }
    };

    match state.queue().enqueue(&session_id, req.priority).await {
        Ok(task) => {
            info!("Analysis requested over HTTP for session {}", session_id);
            (StatusCode::ACCEPTED, Json(AnalysisView::from(task))).into_response()
        }
        Err(e) => queue_error(e),
    }
}

/// GET /sessions/:session_id/analysis
/// Latest report task for the session
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.queue().latest_for_session(&session_id).await {
        Ok(Some(task)) => (StatusCode::OK, Json(AnalysisView::from(task))).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("No analysis for session {}", session_id),
        ),
        Err(e) => queue_error(e),
    }
}

/// POST /sessions/:session_id/analysis/retry
/// Resurrect the most recent failed report task
pub async fn retry_analysis(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.queue().retry_failed_task(&session_id).await {
        Ok(task) => (StatusCode::OK, Json(AnalysisView::from(task))).into_response(),
        Err(e) => queue_error(e),
    }
}

/// GET /analysis/stats
/// Task counts per status
pub async fn get_analysis_stats(State(state): State<AppState>) -> impl IntoResponse {
    match state.queue().stats().await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => queue_error(e),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
