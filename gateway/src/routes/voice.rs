//! Voice WebSocket route configuration

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::voice_handler;
use crate::state::AppState;

/// Create the voice relay router
///
/// # Endpoint
///
/// `GET /ws/voice?postId=<key>` - WebSocket upgrade for one voice session
///
/// Connection limits are applied by [`create_app_router`](super::create_app_router) with
/// [`connection_limit_middleware`](crate::middleware::connection_limit_middleware).
pub fn create_voice_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws/voice", get(voice_handler))
        .layer(TraceLayer::new_for_http())
}
