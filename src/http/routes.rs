use super::handlers;
use super::socket;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Realtime interview connections
        .route("/ws", get(socket::realtime_ws))
        // Session queries
        .route(
            "/sessions/:session_id/status",
            get(handlers::get_session_status),
        )
        .route(
            "/sessions/:session_id/transcript",
            get(handlers::get_session_transcript),
        )
        // Post-interview analysis
        .route(
            "/sessions/:session_id/analysis",
            post(handlers::enqueue_analysis).get(handlers::get_analysis),
        )
        .route(
            "/sessions/:session_id/analysis/retry",
            post(handlers::retry_analysis),
        )
        .route("/analysis/stats", get(handlers::get_analysis_stats))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
