use std::fmt;

use axum::extract::ws::{Message as ClientMessage, close_code};
use futures::{Sink, SinkExt};
use tokio_tungstenite::tungstenite::{self, Message as UpstreamMessage};
use tracing::{debug, error, warn};

use super::relay_loop::RelayOutcome;
use super::state::{Session, SessionState};

/// Message sent to the client when an active upstream becomes unreachable.
pub const UPSTREAM_LOST_MESSAGE: &str = "Upstream connection lost";

/// Build the structured error frame sent to the client before a close.
pub fn error_frame(message: &str) -> ClientMessage {
    let body = serde_json::json!({
        "type": "error",
        "error": { "message": message },
    });
    ClientMessage::Text(body.to_string().into())
}

/// Send one error frame, then close the client with `code`.
pub async fn reject_client<S>(session: &mut Session, client_tx: &mut S, message: &str, code: u16)
where
    S: Sink<ClientMessage> + Unpin,
    S::Error: fmt::Display,
{
    if session.is_client_closed() {
        return;
    }
    if let Err(e) = client_tx.send(error_frame(message)).await {
        debug!(session_id = %session.id(), "Error frame not delivered: {e}");
    }
    session.close_client(client_tx, code, message).await;
}

/// Close whichever side is still open after the relay loop returns.
pub async fn teardown<CTx, UTx>(
    session: &mut Session,
    outcome: &RelayOutcome,
    client_tx: &mut CTx,
    upstream_tx: &mut UTx,
) where
    CTx: Sink<ClientMessage> + Unpin,
    CTx::Error: fmt::Display,
    UTx: Sink<UpstreamMessage, Error = tungstenite::Error> + Unpin,
{
    match outcome {
        RelayOutcome::ClientClosed => {
            session.mark_client_closed();
            begin_closing(session);
            session.close_upstream(upstream_tx).await;
            session.finish();
        }
        RelayOutcome::UpstreamClosed => {
            session.mark_upstream_closed();
            begin_closing(session);
            session
                .close_client(client_tx, close_code::NORMAL, "Upstream closed")
                .await;
            session.finish();
        }
        RelayOutcome::UpstreamFailed(reason) => {
            error!(session_id = %session.id(), "Closing session after upstream failure: {reason}");
            session.fail();
            reject_client(session, client_tx, UPSTREAM_LOST_MESSAGE, close_code::ERROR).await;
            session.close_upstream(upstream_tx).await;
        }
    }
}

fn begin_closing(session: &mut Session) {
    if let Err(e) = session.transition(SessionState::Closing) {
        warn!(session_id = %session.id(), "{e}");
    }
}
