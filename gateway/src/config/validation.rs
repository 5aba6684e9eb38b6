use url::Url;

use super::{RealtimeSettings, ServerConfig};

/// Validate cross-field constraints after all sources are merged.
pub(super) fn validate(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_realtime(&config.realtime)?;
    validate_security(config)?;

    if !config.has_upstream_credential() {
        tracing::warn!(
            "OPENAI_API_KEY is not configured; voice sessions will fail at the upstream handshake"
        );
    }

    Ok(())
}

pub(super) fn validate_realtime(settings: &RealtimeSettings) -> Result<(), String> {
    let url = Url::parse(&settings.url)
        .map_err(|e| format!("Invalid realtime url '{}': {e}", settings.url))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(format!(
            "Invalid realtime url '{}': scheme must be ws or wss",
            settings.url
        ));
    }

    let threshold = settings.vad.threshold;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(format!(
            "Invalid VAD threshold {threshold}: must be between 0.0 and 1.0"
        ));
    }

    if settings.handshake_timeout_ms == 0 {
        return Err("Upstream handshake timeout must be greater than zero".to_string());
    }

    if settings.transcription_model.trim().is_empty() {
        return Err("Transcription model must not be empty".to_string());
    }

    Ok(())
}

fn validate_security(config: &ServerConfig) -> Result<(), String> {
    if config.rate_limit_requests_per_second == 0 {
        return Err("rate_limit_requests_per_second must be greater than zero".to_string());
    }
    if config.rate_limit_burst_size == 0 {
        return Err("rate_limit_burst_size must be greater than zero".to_string());
    }
    if config.max_connections_per_ip == 0 {
        return Err("max_connections_per_ip must be greater than zero".to_string());
    }
    if config.max_websocket_connections == Some(0) {
        return Err("max_websocket_connections must be greater than zero when set".to_string());
    }
    Ok(())
}
