//! OpenAI Realtime API module.
//!
//! Wire types, model/voice configuration and the outbound connector used by
//! the voice bridge.
//!
//! # Audio Format
//!
//! Input and output audio is PCM 16-bit signed little-endian at 24kHz.

mod client;
mod config;
mod messages;

pub use client::{OpenAIRealtimeConnector, UpstreamSink, UpstreamSocket, UpstreamStream};
pub use config::{
    OPENAI_BETA_HEADER_VALUE, OPENAI_REALTIME_SAMPLE_RATE, OPENAI_REALTIME_URL,
    OpenAIRealtimeAudioFormat, OpenAIRealtimeModel, OpenAIRealtimeVoice,
};
pub use messages::{
    ApiError, ClientEvent, InputAudioTranscription, ServerEventHeader, SessionConfig,
    TurnDetection,
};
