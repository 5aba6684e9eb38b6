use std::sync::Arc;

use axum::{Json, extract::State};
use serde::Serialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::state::AppState;

pub const SERVICE_NAME: &str = "veritas-gateway";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    /// RFC 3339, UTC
    pub timestamp: String,
    /// Number of posts sessions can discuss
    pub posts: usize,
    pub active_voice_sessions: usize,
}

/// Liveness probe
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();

    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        timestamp,
        posts: state.posts.len(),
        active_voice_sessions: state.ws_connection_count(),
    })
}
