//! Realtime upstream module.
//!
//! The bridge talks to exactly one upstream provider, the OpenAI Realtime
//! API, over a websocket that carries JSON events in both directions.

mod base;
pub mod openai;

pub use base::{ErrorSeverity, RealtimeError, RealtimeResult, classify_upstream_error};
