use std::net::IpAddr;
use std::sync::Arc;

use axum::{
    Extension,
    extract::{
        RawQuery, State,
        ws::{WebSocket, WebSocketUpgrade, close_code, rejection::WebSocketUpgradeRejection},
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt, stream};
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;
use tracing::{debug, error, info, warn};

use super::messages::{UPSTREAM_CONNECT_FAILED_MESSAGE, VoiceQuery};
use crate::core::relay::RelayContext;
use crate::core::session::{
    PendingFrames, Session, SessionState, await_unless_client_gone, build_instructions,
    reject_client, resolve_post, run_relay, teardown,
};
use crate::middleware::ClientIp;
use crate::state::AppState;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Connection slot taken by the limit middleware, returned on drop.
struct ConnectionSlot {
    state: Arc<AppState>,
    ip: Option<IpAddr>,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        if let Some(ip) = self.ip.take() {
            self.state.release_connection(ip);
        }
    }
}

/// Voice WebSocket handler
///
/// Upgrades `GET /ws/voice?postId=<key>` and pairs the socket with one
/// upstream realtime session about that post.
pub async fn voice_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    RawQuery(raw_query): RawQuery,
    State(state): State<Arc<AppState>>,
    client_ip: Option<Extension<ClientIp>>,
) -> Response {
    let slot = ConnectionSlot {
        state: state.clone(),
        ip: client_ip.map(|Extension(ClientIp(ip))| ip),
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            warn!("Voice WebSocket upgrade rejected: {rejection}");
            return rejection.into_response();
        }
    };

    let query = VoiceQuery::from_raw(raw_query.as_deref());
    info!(post_id = ?query.post_id, "Voice WebSocket upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| async move {
            handle_voice_socket(socket, query, state).await;
            drop(slot);
        })
}

async fn handle_voice_socket(socket: WebSocket, query: VoiceQuery, state: Arc<AppState>) {
    let (mut client_tx, mut client_rx) = socket.split();
    let mut session = Session::new(query.session_key());
    info!(session_id = %session.id(), "Voice session connecting");

    let post = match resolve_post(query.post_id.as_deref(), state.posts.as_ref()) {
        Ok(post) => post,
        Err(e) => {
            warn!(session_id = %session.id(), "Rejecting voice session: {e}");
            session.fail();
            reject_client(&mut session, &mut client_tx, &e.to_string(), close_code::POLICY).await;
            return;
        }
    };
    session.attach_post(post.clone());

    let instructions = match build_instructions(&post) {
        Ok(instructions) => instructions,
        Err(e) => {
            error!(session_id = %session.id(), "Failed to build session instructions: {e}");
            session.fail();
            reject_client(
                &mut session,
                &mut client_tx,
                UPSTREAM_CONNECT_FAILED_MESSAGE,
                close_code::ERROR,
            )
            .await;
            return;
        }
    };

    let mut pending = PendingFrames::default();
    let connected = await_unless_client_gone(
        session.id(),
        state.connector.connect(),
        &mut client_rx,
        &mut pending,
    )
    .await;

    let (mut upstream_tx, mut upstream_rx) = match connected {
        None => {
            info!(
                session_id = %session.id(),
                queued = pending.len(),
                "Client left before the upstream handshake finished, abandoning upstream"
            );
            session.mark_client_closed();
            advance(&mut session, SessionState::Closing);
            session.finish();
            return;
        }
        Some(Ok(halves)) => halves,
        Some(Err(e)) => {
            error!(session_id = %session.id(), "Upstream handshake failed: {e}");
            session.fail();
            reject_client(
                &mut session,
                &mut client_tx,
                UPSTREAM_CONNECT_FAILED_MESSAGE,
                close_code::ERROR,
            )
            .await;
            return;
        }
    };

    advance(&mut session, SessionState::Configuring);

    // Client frames stay queued until the configuration has been sent.
    let update = state.connector.session_update(instructions);
    let configured = match update.to_json() {
        Ok(json) => upstream_tx
            .send(UpstreamMessage::Text(json.into()))
            .await
            .map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    if let Err(e) = configured {
        error!(session_id = %session.id(), "Failed to send session configuration: {e}");
        session.fail();
        session.close_upstream(&mut upstream_tx).await;
        reject_client(
            &mut session,
            &mut client_tx,
            UPSTREAM_CONNECT_FAILED_MESSAGE,
            close_code::ERROR,
        )
        .await;
        return;
    }
    info!(
        session_id = %session.id(),
        post_id = %post.post_id,
        voice = %state.connector.settings().voice,
        "Session configuration sent"
    );

    advance(&mut session, SessionState::Active);

    let settings = state.connector.settings();
    let ctx = RelayContext {
        session_id: session.id().to_string(),
        log_payloads: state.config.log_payloads,
        downstream_audio: settings.downstream_audio,
        downstream_sample_rate: settings.output_audio_format.sample_rate(),
    };

    if !pending.is_empty() {
        debug!(
            session_id = %session.id(),
            queued = pending.len(),
            dropped = pending.dropped(),
            "Replaying client frames received during setup"
        );
    }
    let mut client_rx = stream::iter(pending.into_frames().into_iter().map(Ok)).chain(client_rx);

    let report = run_relay(
        &ctx,
        &mut client_tx,
        &mut client_rx,
        &mut upstream_tx,
        &mut upstream_rx,
    )
    .await;

    teardown(&mut session, &report.outcome, &mut client_tx, &mut upstream_tx).await;

    info!(
        session_id = %session.id(),
        post_id = session.post().map(|p| p.post_id.as_str()).unwrap_or("-"),
        state = %session.state(),
        outcome = ?report.outcome,
        to_upstream = report.stats.to_upstream,
        to_client = report.stats.to_client,
        dropped = report.stats.dropped,
        transient_errors = report.stats.transient_errors,
        "Voice session ended"
    );
}

fn advance(session: &mut Session, next: SessionState) {
    if let Err(e) = session.transition(next) {
        error!(session_id = %session.id(), "{e}");
    }
}
