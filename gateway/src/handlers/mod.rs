//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `voice` - Voice relay WebSocket

pub mod api;
pub mod voice;

pub use voice::voice_handler;
