//! Configuration module for the Veritas gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use veritas_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::PathBuf;

mod env;
mod merge;
mod validation;
mod yaml;

use crate::core::realtime::openai::{
    OPENAI_REALTIME_URL, OpenAIRealtimeAudioFormat, OpenAIRealtimeModel, OpenAIRealtimeVoice,
};

/// Origins allowed when nothing is configured: the web and Expo dev servers.
pub const DEFAULT_CORS_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:19006";

/// Default bound on the upstream websocket handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 5000;

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// How upstream audio frames are packaged for the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownstreamAudioMode {
    /// Forward the upstream bytes as they arrive.
    #[default]
    Passthrough,
    /// Wrap each chunk in a mono pcm16 WAV container.
    Wav,
}

impl DownstreamAudioMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "passthrough" | "raw" => Some(Self::Passthrough),
            "wav" => Some(Self::Wav),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passthrough => "passthrough",
            Self::Wav => "wav",
        }
    }
}

/// Server-side voice activity detection tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct VadSettings {
    /// Amplitude threshold, 0.0 - 1.0
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    /// Trailing silence that ends an utterance
    pub silence_duration_ms: u32,
}

impl Default for VadSettings {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
        }
    }
}

/// Everything the upstream connector needs except the credential.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeSettings {
    pub url: String,
    pub model: OpenAIRealtimeModel,
    pub voice: OpenAIRealtimeVoice,
    pub input_audio_format: OpenAIRealtimeAudioFormat,
    pub output_audio_format: OpenAIRealtimeAudioFormat,
    pub transcription_model: String,
    pub vad: VadSettings,
    pub handshake_timeout_ms: u64,
    pub downstream_audio: DownstreamAudioMode,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            url: OPENAI_REALTIME_URL.to_string(),
            model: OpenAIRealtimeModel::default(),
            voice: OpenAIRealtimeVoice::default(),
            input_audio_format: OpenAIRealtimeAudioFormat::Pcm16,
            output_audio_format: OpenAIRealtimeAudioFormat::Pcm16,
            transcription_model: "whisper-1".to_string(),
            vad: VadSettings::default(),
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
            downstream_audio: DownstreamAudioMode::default(),
        }
    }
}

/// Server configuration
///
/// Contains all configuration needed to run the gateway:
/// - Server settings (host, port, TLS)
/// - The upstream credential and realtime session settings
/// - Content catalog location
/// - Security settings (CORS, rate limiting, connection limits)
#[derive(Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    /// Bearer credential for the realtime upstream. Never logged.
    pub openai_api_key: Option<String>,
    pub realtime: RealtimeSettings,

    /// JSON file replacing the bundled post catalog
    pub posts_path: Option<PathBuf>,

    /// Log frame payloads at trace level in addition to frame metadata
    pub log_payloads: bool,

    // Security settings
    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: u32,
    pub rate_limit_burst_size: u32,
    pub max_websocket_connections: Option<usize>,
    pub max_connections_per_ip: u32,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("realtime", &self.realtime)
            .field("posts_path", &self.posts_path)
            .field("log_payloads", &self.log_payloads)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field(
                "rate_limit_requests_per_second",
                &self.rate_limit_requests_per_second,
            )
            .field("rate_limit_burst_size", &self.rate_limit_burst_size)
            .field("max_websocket_connections", &self.max_websocket_connections)
            .field("max_connections_per_ip", &self.max_connections_per_ip)
            .finish()
    }
}

impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file, with environment variables filling
    /// anything the file leaves out.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    pub fn has_upstream_credential(&self) -> bool {
        self.openai_api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}
