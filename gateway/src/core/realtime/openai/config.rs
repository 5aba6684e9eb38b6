//! Wire names for the `session.update` fields the gateway lets operators pick.

use serde::{Deserialize, Serialize};

/// OpenAI Realtime API WebSocket endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Protocol version header value required by the Realtime API.
pub const OPENAI_BETA_HEADER_VALUE: &str = "realtime=v1";

/// Sample rate of pcm16 audio on the Realtime API.
pub const OPENAI_REALTIME_SAMPLE_RATE: u32 = 24000;

/// Declares a `Copy` enum whose variants serialize to fixed wire names.
///
/// Parsing accepts the wire name or any listed alias, ignoring case and
/// surrounding whitespace, and falls back to the `#[default]` variant.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident = $wire:literal $(| $alias:literal)*
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }

            pub fn from_str_or_default(s: &str) -> Self {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($wire $(| $alias)* => Self::$variant,)+
                    _ => Self::default(),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum! {
    /// Realtime model requested through the `?model=` query parameter.
    pub enum OpenAIRealtimeModel {
        #[default]
        Gpt4oRealtimePreview20241001 = "gpt-4o-realtime-preview-2024-10-01",
        Gpt4oMiniRealtimePreview = "gpt-4o-mini-realtime-preview",
    }
}

wire_enum! {
    /// Coach voice.
    pub enum OpenAIRealtimeVoice {
        #[default]
        Alloy = "alloy",
        Ash = "ash",
        Ballad = "ballad",
        Coral = "coral",
        Echo = "echo",
        Sage = "sage",
        Shimmer = "shimmer",
        Verse = "verse",
    }
}

wire_enum! {
    /// Audio encoding for one direction of the session.
    pub enum OpenAIRealtimeAudioFormat {
        /// 16-bit little-endian mono
        #[default]
        Pcm16 = "pcm16",
        G711Ulaw = "g711_ulaw" | "ulaw" | "mulaw",
        G711Alaw = "g711_alaw" | "alaw",
    }
}

impl OpenAIRealtimeAudioFormat {
    pub fn sample_rate(&self) -> u32 {
        match self {
            Self::Pcm16 => OPENAI_REALTIME_SAMPLE_RATE,
            Self::G711Ulaw | Self::G711Alaw => 8000,
        }
    }
}
