use std::path::PathBuf;

use super::yaml::{RealtimeYaml, TlsYaml, YamlConfig};
use super::{DownstreamAudioMode, RealtimeSettings, ServerConfig, TlsConfig, env};
use crate::core::realtime::openai::{
    OpenAIRealtimeAudioFormat, OpenAIRealtimeModel, OpenAIRealtimeVoice,
};

/// Merge YAML values over the environment-derived configuration.
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = env::load_from_env()?;
    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(tls) = server.tls {
            config.tls = merge_tls(tls, config.tls.take())?;
        }
    }

    if let Some(providers) = yaml.providers
        && let Some(key) = providers.openai_api_key
    {
        config.openai_api_key = Some(key);
    }

    if let Some(realtime) = yaml.realtime {
        merge_realtime(realtime, &mut config.realtime)?;
    }

    if let Some(content) = yaml.content
        && let Some(path) = content.posts_path
    {
        config.posts_path = Some(PathBuf::from(path));
    }

    if let Some(logging) = yaml.logging
        && let Some(log_payloads) = logging.log_payloads
    {
        config.log_payloads = log_payloads;
    }

    if let Some(security) = yaml.security {
        if let Some(origins) = security.cors_allowed_origins {
            config.cors_allowed_origins = Some(origins);
        }
        if let Some(rps) = security.rate_limit_requests_per_second {
            config.rate_limit_requests_per_second = rps;
        }
        if let Some(burst) = security.rate_limit_burst_size {
            config.rate_limit_burst_size = burst;
        }
        if let Some(max) = security.max_websocket_connections {
            config.max_websocket_connections = Some(max);
        }
        if let Some(per_ip) = security.max_connections_per_ip {
            config.max_connections_per_ip = per_ip;
        }
    }

    Ok(config)
}

fn merge_tls(tls: TlsYaml, current: Option<TlsConfig>) -> Result<Option<TlsConfig>, String> {
    match tls.enabled {
        Some(false) => Ok(None),
        Some(true) => {
            let cert_path = tls
                .cert_path
                .map(PathBuf::from)
                .or_else(|| current.as_ref().map(|c| c.cert_path.clone()))
                .ok_or_else(|| "server.tls.enabled is true but cert_path is missing".to_string())?;
            let key_path = tls
                .key_path
                .map(PathBuf::from)
                .or_else(|| current.as_ref().map(|c| c.key_path.clone()))
                .ok_or_else(|| "server.tls.enabled is true but key_path is missing".to_string())?;
            Ok(Some(TlsConfig {
                cert_path,
                key_path,
            }))
        }
        None => Ok(current),
    }
}

fn merge_realtime(yaml: RealtimeYaml, settings: &mut RealtimeSettings) -> Result<(), String> {
    if let Some(url) = yaml.url {
        settings.url = url;
    }
    if let Some(model) = yaml.model {
        settings.model = OpenAIRealtimeModel::from_str_or_default(&model);
    }
    if let Some(voice) = yaml.voice {
        settings.voice = OpenAIRealtimeVoice::from_str_or_default(&voice);
    }
    if let Some(format) = yaml.input_audio_format {
        settings.input_audio_format = OpenAIRealtimeAudioFormat::from_str_or_default(&format);
    }
    if let Some(format) = yaml.output_audio_format {
        settings.output_audio_format = OpenAIRealtimeAudioFormat::from_str_or_default(&format);
    }
    if let Some(model) = yaml.transcription_model {
        settings.transcription_model = model;
    }
    if let Some(timeout) = yaml.handshake_timeout_ms {
        settings.handshake_timeout_ms = timeout;
    }
    if let Some(mode) = yaml.downstream_audio {
        settings.downstream_audio = DownstreamAudioMode::parse(&mode).ok_or_else(|| {
            format!("Invalid realtime.downstream_audio '{mode}': expected passthrough or wav")
        })?;
    }
    if let Some(vad) = yaml.vad {
        if let Some(threshold) = vad.threshold {
            settings.vad.threshold = threshold;
        }
        if let Some(prefix) = vad.prefix_padding_ms {
            settings.vad.prefix_padding_ms = prefix;
        }
        if let Some(silence) = vad.silence_duration_ms {
            settings.vad.silence_duration_ms = silence;
        }
    }
    Ok(())
}
