//! Frame classification and per-hop forwarding between the client socket
//! and the realtime upstream.

mod forward;
mod frame;

pub use forward::{RelayContext, to_client, to_upstream, wrap_pcm16_wav};
pub use frame::{
    ControlFrame, Direction, Frame, classify_client_message, classify_upstream_message,
    strip_wav_container,
};
