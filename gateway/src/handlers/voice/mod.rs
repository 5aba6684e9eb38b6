//! Voice WebSocket handler
//!
//! `GET /ws/voice?postId=<key>` pairs one client socket with one OpenAI
//! Realtime session about the given post.
//!
//! # Protocol
//!
//! ## Client → Server
//!
//! - **JSON object text**: realtime client events, forwarded unchanged
//! - **Binary frames**: pcm16 audio, optionally inside a WAV container
//! - **Other text**: base64 audio
//!
//! Frames sent before the upstream is configured are held and forwarded
//! after the configuration. Closing during the upstream handshake abandons it.
//!
//! ## Server → Client
//!
//! - **JSON text**: realtime server events, upstream errors included
//! - **Binary frames**: response audio
//! - **`{"type":"error","error":{"message":...}}`**: sent once before the
//!   gateway closes the socket with code 1008 (bad `postId`) or 1011
//!   (upstream failure)

mod handler;
pub mod messages;

pub use handler::voice_handler;
