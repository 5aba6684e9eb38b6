//! Frame classifier.
//!
//! Neither transport tags its payloads, so each frame is classified on
//! arrival: text that parses as a JSON object is a control frame, anything
//! else is audio. This is a heuristic. A binary payload that happens to be
//! valid JSON text is still audio because binary frames are never parsed.

use std::fmt;

use axum::extract::ws::Message as ClientMessage;
use base64::prelude::*;
use bytes::Bytes;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;
use tracing::trace;

/// Which way a frame is travelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToUpstream,
    UpstreamToClient,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::ClientToUpstream => "client->upstream",
            Direction::UpstreamToClient => "upstream->client",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured control message, kept as the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFrame {
    pub text: String,
    /// Value of the `type` field, when present
    pub event_type: Option<String>,
}

impl ControlFrame {
    pub fn event_type_or_unknown(&self) -> &str {
        self.event_type.as_deref().unwrap_or("unknown")
    }
}

/// A classified payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Control(ControlFrame),
    /// Raw audio bytes with any container removed
    Audio(Bytes),
}

impl Frame {
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Control(_) => "control",
            Frame::Audio(_) => "audio",
        }
    }

    pub fn byte_len(&self) -> usize {
        match self {
            Frame::Control(control) => control.text.len(),
            Frame::Audio(audio) => audio.len(),
        }
    }
}

/// Classify a frame from the client socket.
///
/// Returns `None` for ping, pong and close frames.
pub fn classify_client_message(message: ClientMessage) -> Option<Frame> {
    let direction = Direction::ClientToUpstream;
    let frame = match message {
        ClientMessage::Text(text) => classify_text(text.as_str(), direction),
        ClientMessage::Binary(data) => Frame::Audio(strip_wav_container(data)),
        ClientMessage::Ping(_) => return skipped(direction, "ping"),
        ClientMessage::Pong(_) => return skipped(direction, "pong"),
        ClientMessage::Close(_) => return skipped(direction, "close"),
    };
    classified(frame, direction)
}

/// Classify a frame from the upstream socket.
///
/// Returns `None` for ping, pong, close and raw frames.
pub fn classify_upstream_message(message: UpstreamMessage) -> Option<Frame> {
    let direction = Direction::UpstreamToClient;
    let frame = match message {
        UpstreamMessage::Text(text) => classify_text(text.as_str(), direction),
        UpstreamMessage::Binary(data) => Frame::Audio(strip_wav_container(data)),
        UpstreamMessage::Ping(_) => return skipped(direction, "ping"),
        UpstreamMessage::Pong(_) => return skipped(direction, "pong"),
        UpstreamMessage::Close(_) => return skipped(direction, "close"),
        UpstreamMessage::Frame(_) => return skipped(direction, "raw"),
    };
    classified(frame, direction)
}

fn classified(frame: Frame, direction: Direction) -> Option<Frame> {
    trace!(
        direction = %direction,
        kind = frame.kind(),
        bytes = frame.byte_len(),
        "Classified frame"
    );
    Some(frame)
}

fn skipped(direction: Direction, kind: &'static str) -> Option<Frame> {
    trace!(direction = %direction, kind, "Skipping transport frame");
    None
}

fn classify_text(text: &str, direction: Direction) -> Frame {
    if let Ok(serde_json::Value::Object(fields)) = serde_json::from_str::<serde_json::Value>(text)
    {
        let event_type = fields
            .get("type")
            .and_then(|value| value.as_str())
            .map(str::to_string);
        return Frame::Control(ControlFrame {
            text: text.to_string(),
            event_type,
        });
    }

    // Clients may send audio as base64 text; upstream text that is not JSON
    // is passed on as-is.
    let audio = match direction {
        Direction::ClientToUpstream => match BASE64_STANDARD.decode(text.trim()) {
            Ok(decoded) => Bytes::from(decoded),
            Err(_) => Bytes::copy_from_slice(text.as_bytes()),
        },
        Direction::UpstreamToClient => Bytes::copy_from_slice(text.as_bytes()),
    };
    Frame::Audio(strip_wav_container(audio))
}

/// Remove a RIFF/WAVE container, returning the `data` chunk payload.
///
/// Anything that is not a RIFF/WAVE buffer is returned untouched, as is a
/// container without a `data` chunk. A zero or `u32::MAX` data size (written
/// by streaming recorders) means the payload runs to the end of the buffer.
pub fn strip_wav_container(bytes: Bytes) -> Bytes {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return bytes;
    }

    let mut offset = 12usize;
    while offset + 8 <= bytes.len() {
        let chunk_id = &bytes[offset..offset + 4];
        let size = u32::from_le_bytes([
            bytes[offset + 4],
            bytes[offset + 5],
            bytes[offset + 6],
            bytes[offset + 7],
        ]);
        let body = offset + 8;

        if chunk_id == b"data" {
            let end = if size == 0 || size == u32::MAX {
                bytes.len()
            } else {
                body.saturating_add(size as usize).min(bytes.len())
            };
            return bytes.slice(body..end);
        }

        // Chunks are word aligned.
        let padded = size as usize + (size as usize & 1);
        offset = body.saturating_add(padded);
    }

    bytes
}
