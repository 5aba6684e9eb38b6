pub mod api;
pub mod voice;

use std::sync::Arc;

use axum::{Router, middleware};

use crate::middleware::connection_limit_middleware;
use crate::state::AppState;

/// Public routes plus the voice route behind its connection limits.
///
/// Serve with `into_make_service_with_connect_info::<SocketAddr>()`; the
/// limit middleware needs the peer address.
pub fn create_app_router(state: Arc<AppState>) -> Router {
    let voice_routes = voice::create_voice_router().layer(middleware::from_fn_with_state(
        state.clone(),
        connection_limit_middleware,
    ));

    api::create_api_router()
        .merge(voice_routes)
        .with_state(state)
}
