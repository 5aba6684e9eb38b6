use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::{
    DEFAULT_CORS_ALLOWED_ORIGINS, DownstreamAudioMode, RealtimeSettings, ServerConfig, TlsConfig,
    VadSettings,
};
use crate::core::realtime::openai::{
    OpenAIRealtimeAudioFormat, OpenAIRealtimeModel, OpenAIRealtimeVoice,
};

/// Read a variable, treating blank values as unset.
fn env_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_env<T>(name: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {name} '{raw}': {e}")),
        None => Ok(None),
    }
}

pub(super) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn bool_env(name: &str) -> Result<Option<bool>, String> {
    match env_var(name) {
        Some(raw) => parse_bool(&raw)
            .map(Some)
            .ok_or_else(|| format!("Invalid value for {name} '{raw}': expected true or false")),
        None => Ok(None),
    }
}

fn tls_from_env() -> Result<Option<TlsConfig>, String> {
    if !bool_env("TLS_ENABLED")?.unwrap_or(false) {
        return Ok(None);
    }

    let cert_path = env_var("TLS_CERT_PATH")
        .ok_or_else(|| "TLS_ENABLED is set but TLS_CERT_PATH is missing".to_string())?;
    let key_path = env_var("TLS_KEY_PATH")
        .ok_or_else(|| "TLS_ENABLED is set but TLS_KEY_PATH is missing".to_string())?;

    Ok(Some(TlsConfig {
        cert_path: PathBuf::from(cert_path),
        key_path: PathBuf::from(key_path),
    }))
}

fn realtime_from_env() -> Result<RealtimeSettings, String> {
    let defaults = RealtimeSettings::default();
    let vad_defaults = VadSettings::default();

    let downstream_audio = match env_var("DOWNSTREAM_AUDIO_MODE") {
        Some(raw) => DownstreamAudioMode::parse(&raw).ok_or_else(|| {
            format!("Invalid value for DOWNSTREAM_AUDIO_MODE '{raw}': expected passthrough or wav")
        })?,
        None => defaults.downstream_audio,
    };

    Ok(RealtimeSettings {
        url: env_var("OPENAI_REALTIME_URL").unwrap_or(defaults.url),
        model: env_var("OPENAI_REALTIME_MODEL")
            .map(|m| OpenAIRealtimeModel::from_str_or_default(&m))
            .unwrap_or(defaults.model),
        voice: env_var("OPENAI_REALTIME_VOICE")
            .map(|v| OpenAIRealtimeVoice::from_str_or_default(&v))
            .unwrap_or(defaults.voice),
        input_audio_format: env_var("REALTIME_INPUT_AUDIO_FORMAT")
            .map(|f| OpenAIRealtimeAudioFormat::from_str_or_default(&f))
            .unwrap_or(defaults.input_audio_format),
        output_audio_format: env_var("REALTIME_OUTPUT_AUDIO_FORMAT")
            .map(|f| OpenAIRealtimeAudioFormat::from_str_or_default(&f))
            .unwrap_or(defaults.output_audio_format),
        transcription_model: env_var("REALTIME_TRANSCRIPTION_MODEL")
            .unwrap_or(defaults.transcription_model),
        vad: VadSettings {
            threshold: parse_env("REALTIME_VAD_THRESHOLD")?.unwrap_or(vad_defaults.threshold),
            prefix_padding_ms: parse_env("REALTIME_VAD_PREFIX_PADDING_MS")?
                .unwrap_or(vad_defaults.prefix_padding_ms),
            silence_duration_ms: parse_env("REALTIME_VAD_SILENCE_DURATION_MS")?
                .unwrap_or(vad_defaults.silence_duration_ms),
        },
        handshake_timeout_ms: parse_env("UPSTREAM_HANDSHAKE_TIMEOUT_MS")?
            .unwrap_or(defaults.handshake_timeout_ms),
        downstream_audio,
    })
}

/// Build a configuration from environment variables and defaults.
pub(super) fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    Ok(ServerConfig {
        host: env_var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
        port: parse_env("PORT")?.unwrap_or(3001),
        tls: tls_from_env()?,
        openai_api_key: env_var("OPENAI_API_KEY"),
        realtime: realtime_from_env()?,
        posts_path: env_var("POSTS_PATH").map(PathBuf::from),
        log_payloads: bool_env("LOG_FRAME_PAYLOADS")?.unwrap_or(false),
        cors_allowed_origins: Some(
            env_var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|| DEFAULT_CORS_ALLOWED_ORIGINS.to_string()),
        ),
        rate_limit_requests_per_second: parse_env("RATE_LIMIT_REQUESTS_PER_SECOND")?
            .unwrap_or(60),
        rate_limit_burst_size: parse_env("RATE_LIMIT_BURST_SIZE")?.unwrap_or(10),
        max_websocket_connections: parse_env("MAX_WEBSOCKET_CONNECTIONS")?,
        max_connections_per_ip: parse_env("MAX_CONNECTIONS_PER_IP")?.unwrap_or(100),
    })
}
