//! Connection limits for voice WebSocket upgrades
//!
//! Enforces the global WebSocket cap and the per-IP cap. Plain HTTP requests
//! pass straight through.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode, header::UPGRADE},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::state::{AppState, ConnectionLimitError};

/// Client address of an upgrade holding a connection slot.
///
/// The voice handler releases the slot when the socket finishes.
#[derive(Clone, Copy, Debug)]
pub struct ClientIp(pub IpAddr);

/// Reject upgrades over capacity: 503 for the global cap, 429 per IP.
pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let is_ws_upgrade = request
        .headers()
        .get(UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));

    if !is_ws_upgrade {
        return next.run(request).await;
    }

    let client_ip = addr.ip();
    match state.try_acquire_connection(client_ip) {
        Ok(()) => {
            request.extensions_mut().insert(ClientIp(client_ip));
            next.run(request).await
        }
        Err(ConnectionLimitError::GlobalLimitReached) => {
            tracing::warn!(
                ip = %client_ip,
                active = state.ws_connection_count(),
                "Rejecting voice connection: global limit reached"
            );
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Server at capacity. Please try again later.",
            )
                .into_response()
        }
        Err(ConnectionLimitError::PerIpLimitReached) => {
            tracing::warn!(
                ip = %client_ip,
                "Rejecting voice connection: per-IP limit reached"
            );
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many connections from your IP address.",
            )
                .into_response()
        }
    }
}
