use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::ws::{CloseFrame, Message as ClientMessage};
use futures::{Sink, SinkExt};
use thiserror::Error;
use tokio_tungstenite::tungstenite::{
    self, Message as UpstreamMessage,
    protocol::{CloseFrame as UpstreamCloseFrame, frame::coding::CloseCode},
};
use tracing::debug;

use crate::core::posts::Post;

/// Lifecycle of one paired client/upstream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Client accepted; resolving content and opening upstream
    #[default]
    Connecting,
    /// Upstream open; session configuration being sent
    Configuring,
    /// Frames relayed in both directions
    Active,
    /// One side closed or failed; closing the other
    Closing,
    Closed,
    Failed,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Closed, _) | (Failed, _) => false,
            (_, Failed) => true,
            (Connecting, Configuring) | (Connecting, Closing) => true,
            (Configuring, Active) | (Configuring, Closing) => true,
            (Active, Closing) => true,
            (Closing, Closed) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Connecting => write!(f, "Connecting"),
            SessionState::Configuring => write!(f, "Configuring"),
            SessionState::Active => write!(f, "Active"),
            SessionState::Closing => write!(f, "Closing"),
            SessionState::Closed => write!(f, "Closed"),
            SessionState::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Invalid session transition from {from} to {to}")]
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },
}

/// One voice session.
///
/// Owns the lifecycle state and the close-once flags for both sides. The
/// connection halves themselves stay with the caller and are lent to the
/// close methods.
#[derive(Debug)]
pub struct Session {
    id: String,
    post: Option<Arc<Post>>,
    state: SessionState,
    client_closed: bool,
    upstream_closed: bool,
}

impl Session {
    /// Start a session for `key`; the id is `<key>-<unix millis>`.
    pub fn new(key: &str) -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let key = if key.trim().is_empty() {
            "unknown"
        } else {
            key.trim()
        };

        Self {
            id: format!("{key}-{millis}"),
            post: None,
            state: SessionState::Connecting,
            client_closed: false,
            upstream_closed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn post(&self) -> Option<&Arc<Post>> {
        self.post.as_ref()
    }

    pub fn attach_post(&mut self, post: Arc<Post>) {
        self.post = Some(post);
    }

    pub fn transition(&mut self, next: SessionState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(session_id = %self.id, from = %self.state, to = %next, "Session transition");
        self.state = next;
        Ok(())
    }

    /// Move to `Failed` unless the session already ended.
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            debug!(session_id = %self.id, from = %self.state, "Session failed");
            self.state = SessionState::Failed;
        }
    }

    /// Finish teardown: `Closed`, or stay `Failed`.
    pub fn finish(&mut self) {
        if !self.state.is_terminal() {
            debug!(session_id = %self.id, from = %self.state, "Session closed");
            self.state = SessionState::Closed;
        }
    }

    pub fn is_client_closed(&self) -> bool {
        self.client_closed
    }

    pub fn is_upstream_closed(&self) -> bool {
        self.upstream_closed
    }

    /// Record that the client went away on its own.
    pub fn mark_client_closed(&mut self) {
        self.client_closed = true;
    }

    /// Record that the upstream went away on its own.
    pub fn mark_upstream_closed(&mut self) {
        self.upstream_closed = true;
    }

    /// Close the client side once. Returns whether a close was attempted.
    pub async fn close_client<S>(&mut self, sink: &mut S, code: u16, reason: &str) -> bool
    where
        S: Sink<ClientMessage> + Unpin,
        S::Error: fmt::Display,
    {
        if self.client_closed {
            return false;
        }
        self.client_closed = true;

        let frame = CloseFrame {
            code,
            reason: reason.into(),
        };
        if let Err(e) = sink.send(ClientMessage::Close(Some(frame))).await {
            debug!(session_id = %self.id, "Client close frame not delivered: {e}");
        }
        true
    }

    /// Close the upstream side once. Returns whether a close was attempted.
    pub async fn close_upstream<S>(&mut self, sink: &mut S) -> bool
    where
        S: Sink<UpstreamMessage, Error = tungstenite::Error> + Unpin,
    {
        if self.upstream_closed {
            return false;
        }
        self.upstream_closed = true;

        let frame = UpstreamCloseFrame {
            code: CloseCode::Normal,
            reason: "client session ended".into(),
        };
        if let Err(e) = sink.send(UpstreamMessage::Close(Some(frame))).await {
            debug!(session_id = %self.id, "Upstream close frame not delivered: {e}");
        }
        true
    }
}
