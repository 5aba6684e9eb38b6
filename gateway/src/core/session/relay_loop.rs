use std::fmt;

use axum::extract::ws::Message as ClientMessage;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::{self, Message as UpstreamMessage};
use tracing::{debug, error, warn};

use crate::core::realtime::{ErrorSeverity, classify_upstream_error};
use crate::core::relay::{
    RelayContext, classify_client_message, classify_upstream_message, to_client, to_upstream,
};

/// Why the relay loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The client closed, errored or stopped accepting frames
    ClientClosed,
    /// The upstream sent a close frame or its stream ended
    UpstreamClosed,
    /// The upstream became unreachable
    UpstreamFailed(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub to_upstream: u64,
    pub to_client: u64,
    pub dropped: u64,
    pub transient_errors: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReport {
    pub outcome: RelayOutcome,
    pub stats: RelayStats,
}

/// Relay frames between an active client and upstream until one side ends.
///
/// Each frame is forwarded before the next one on the same side is read, so
/// per-direction order is kept. Neither side is closed here; the caller
/// tears the pair down based on the returned outcome.
pub async fn run_relay<CTx, CRx, UTx, URx>(
    ctx: &RelayContext,
    client_tx: &mut CTx,
    client_rx: &mut CRx,
    upstream_tx: &mut UTx,
    upstream_rx: &mut URx,
) -> RelayReport
where
    CTx: Sink<ClientMessage> + Unpin,
    CTx::Error: fmt::Display,
    CRx: Stream<Item = Result<ClientMessage, axum::Error>> + Unpin,
    UTx: Sink<UpstreamMessage, Error = tungstenite::Error> + Unpin,
    URx: Stream<Item = Result<UpstreamMessage, tungstenite::Error>> + Unpin,
{
    let mut stats = RelayStats::default();

    let outcome = loop {
        tokio::select! {
            inbound = client_rx.next() => {
                let message = match inbound {
                    Some(Ok(ClientMessage::Close(frame))) => {
                        debug!(
                            session_id = %ctx.session_id,
                            code = ?frame.as_ref().map(|f| f.code),
                            "Client closed the connection"
                        );
                        break RelayOutcome::ClientClosed;
                    }
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        warn!(session_id = %ctx.session_id, "Client connection error: {e}");
                        break RelayOutcome::ClientClosed;
                    }
                    None => {
                        debug!(session_id = %ctx.session_id, "Client stream ended");
                        break RelayOutcome::ClientClosed;
                    }
                };

                let Some(frame) = classify_client_message(message) else {
                    continue;
                };
                let Some(outbound) = to_upstream(frame, ctx) else {
                    stats.dropped += 1;
                    continue;
                };

                match upstream_tx.send(outbound).await {
                    Ok(()) => stats.to_upstream += 1,
                    Err(e) => match classify_upstream_error(&e) {
                        ErrorSeverity::Fatal => {
                            error!(session_id = %ctx.session_id, "Upstream unreachable while sending: {e}");
                            break RelayOutcome::UpstreamFailed(e.to_string());
                        }
                        ErrorSeverity::Transient => {
                            stats.dropped += 1;
                            stats.transient_errors += 1;
                            warn!(session_id = %ctx.session_id, "Dropped frame, upstream send failed: {e}");
                        }
                    },
                }
            }
            inbound = upstream_rx.next() => {
                let message = match inbound {
                    Some(Ok(UpstreamMessage::Close(frame))) => {
                        debug!(
                            session_id = %ctx.session_id,
                            code = ?frame.as_ref().map(|f| u16::from(f.code)),
                            "Upstream closed the connection"
                        );
                        break RelayOutcome::UpstreamClosed;
                    }
                    Some(Ok(message)) => message,
                    Some(Err(e)) => match classify_upstream_error(&e) {
                        ErrorSeverity::Fatal => {
                            error!(session_id = %ctx.session_id, "Upstream connection failed: {e}");
                            break RelayOutcome::UpstreamFailed(e.to_string());
                        }
                        ErrorSeverity::Transient => {
                            stats.transient_errors += 1;
                            warn!(session_id = %ctx.session_id, "Upstream read error: {e}");
                            continue;
                        }
                    },
                    None => {
                        debug!(session_id = %ctx.session_id, "Upstream stream ended");
                        break RelayOutcome::UpstreamClosed;
                    }
                };

                let Some(frame) = classify_upstream_message(message) else {
                    continue;
                };
                let Some(outbound) = to_client(frame, ctx) else {
                    stats.dropped += 1;
                    continue;
                };

                if let Err(e) = client_tx.send(outbound).await {
                    debug!(session_id = %ctx.session_id, "Client no longer accepting frames: {e}");
                    break RelayOutcome::ClientClosed;
                }
                stats.to_client += 1;
            }
        }
    };

    RelayReport { outcome, stats }
}
