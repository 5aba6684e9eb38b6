//! OpenAI Realtime API WebSocket message types.
//!
//! Only the events the bridge itself produces are modelled as typed client
//! events:
//! - session.update - sent once, right after the upstream handshake
//! - input_audio_buffer.append - wraps every client audio frame
//!
//! Every other client control message is relayed verbatim. Server events are
//! relayed verbatim too; [`ServerEventHeader`] is the lenient view the relay
//! parses for logging.

use base64::prelude::*;
use serde::{Deserialize, Serialize};

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration for OpenAI Realtime API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// System instructions for the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Voice for audio output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<String>,

    /// Input audio transcription configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<InputAudioTranscription>,

    /// Turn detection configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetection>,
}

/// Input audio transcription configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputAudioTranscription {
    /// Transcription model (e.g., "whisper-1")
    pub model: String,
}

/// Turn detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        /// Activation threshold (0.0 - 1.0)
        threshold: f32,
        /// Audio kept before detected speech, in ms
        prefix_padding_ms: u32,
        /// Trailing silence that ends an utterance, in ms
        silence_duration_ms: u32,
    },
}

// =============================================================================
// Client Events (sent to server)
// =============================================================================

/// Client events the bridge generates on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Update session configuration
    #[serde(rename = "session.update")]
    SessionUpdate {
        /// Session configuration
        session: SessionConfig,
    },

    /// Append audio to input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64-encoded audio data
        audio: String,
    },
}

impl ClientEvent {
    /// Create an audio append event from raw bytes.
    pub fn audio_append(data: &[u8]) -> Self {
        ClientEvent::InputAudioBufferAppend {
            audio: BASE64_STANDARD.encode(data),
        }
    }

    /// Wire name of the event.
    pub fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::SessionUpdate { .. } => "session.update",
            ClientEvent::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Server Events (received from server)
// =============================================================================

/// The part of an upstream event the relay inspects.
///
/// Unknown fields are ignored so that any event type deserializes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerEventHeader {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

/// API error information.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApiError {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
    /// Parameter that caused the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    /// Event ID that caused the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}
