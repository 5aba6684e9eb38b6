use std::collections::VecDeque;
use std::future::Future;

use axum::extract::ws::Message as ClientMessage;
use futures::{Stream, StreamExt};
use tracing::{debug, trace, warn};

/// Client frames held back while the upstream is not yet configured.
pub const MAX_PENDING_FRAMES: usize = 256;

/// Client frames received before the session became active, in arrival order.
#[derive(Debug, Default)]
pub struct PendingFrames {
    frames: VecDeque<ClientMessage>,
    dropped: u64,
}

impl PendingFrames {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn push(&mut self, message: ClientMessage) -> bool {
        if self.frames.len() >= MAX_PENDING_FRAMES {
            self.dropped += 1;
            return false;
        }
        self.frames.push_back(message);
        true
    }

    pub fn into_frames(self) -> VecDeque<ClientMessage> {
        self.frames
    }
}

/// Drive `work` to completion while watching the client socket.
///
/// Data frames that arrive in the meantime are queued in `pending`. If the
/// client closes, errors or goes away first, `work` is dropped and `None` is
/// returned.
pub async fn await_unless_client_gone<F, CRx>(
    session_id: &str,
    work: F,
    client_rx: &mut CRx,
    pending: &mut PendingFrames,
) -> Option<F::Output>
where
    F: Future,
    CRx: Stream<Item = Result<ClientMessage, axum::Error>> + Unpin,
{
    tokio::pin!(work);

    loop {
        tokio::select! {
            biased;

            output = &mut work => return Some(output),
            inbound = client_rx.next() => match inbound {
                Some(Ok(ClientMessage::Close(frame))) => {
                    debug!(
                        session_id,
                        code = ?frame.as_ref().map(|f| f.code),
                        "Client closed during session setup"
                    );
                    return None;
                }
                Some(Ok(message)) => {
                    if pending.push(message) {
                        trace!(session_id, queued = pending.len(), "Queued client frame until session is active");
                    } else {
                        warn!(session_id, dropped = pending.dropped(), "Setup queue full, dropping client frame");
                    }
                }
                Some(Err(e)) => {
                    warn!(session_id, "Client connection error during session setup: {e}");
                    return None;
                }
                None => {
                    debug!(session_id, "Client stream ended during session setup");
                    return None;
                }
            },
        }
    }
}
