//! Outbound connection to the OpenAI Realtime API.
//!
//! One connector is built at startup from [`RealtimeSettings`] and shared by
//! every session. Each call to [`OpenAIRealtimeConnector::connect`] opens a
//! fresh upstream socket and only returns once the websocket handshake has
//! completed, bounded by the configured handshake timeout.

use std::fmt;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::StreamExt;
use http::HeaderValue;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;
use zeroize::Zeroizing;

use super::config::OPENAI_BETA_HEADER_VALUE;
use super::messages::{ClientEvent, InputAudioTranscription, SessionConfig, TurnDetection};
use crate::config::RealtimeSettings;
use crate::core::realtime::base::{RealtimeError, RealtimeResult};

/// Upstream websocket as returned by tokio-tungstenite.
pub type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;
/// Write half of the upstream socket.
pub type UpstreamSink = SplitSink<UpstreamSocket, Message>;
/// Read half of the upstream socket.
pub type UpstreamStream = SplitStream<UpstreamSocket>;

/// Opens authenticated sockets to the realtime upstream.
#[derive(Clone)]
pub struct OpenAIRealtimeConnector {
    settings: RealtimeSettings,
    api_key: Option<Zeroizing<String>>,
}

impl fmt::Debug for OpenAIRealtimeConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIRealtimeConnector")
            .field("url", &self.settings.url)
            .field("model", &self.settings.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl OpenAIRealtimeConnector {
    pub fn new(settings: RealtimeSettings, api_key: Option<String>) -> Self {
        Self {
            settings,
            api_key: api_key.map(Zeroizing::new),
        }
    }

    pub fn settings(&self) -> &RealtimeSettings {
        &self.settings
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.settings.handshake_timeout_ms)
    }

    /// Build the WebSocket URL with model parameter.
    ///
    /// A `model` query parameter already present in the configured URL wins.
    pub fn build_ws_url(&self) -> RealtimeResult<Url> {
        let mut url = Url::parse(&self.settings.url).map_err(|e| {
            RealtimeError::InvalidConfiguration(format!(
                "invalid realtime url '{}': {e}",
                self.settings.url
            ))
        })?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(RealtimeError::InvalidConfiguration(format!(
                "realtime url must use ws or wss, got '{}'",
                url.scheme()
            )));
        }

        if !url.query_pairs().any(|(key, _)| key == "model") {
            url.query_pairs_mut()
                .append_pair("model", self.settings.model.as_str());
        }

        Ok(url)
    }

    /// Build the handshake request with bearer and protocol-version headers.
    pub fn build_request(&self) -> RealtimeResult<http::Request<()>> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            RealtimeError::AuthenticationFailed("OpenAI API key not configured".to_string())
        })?;

        let url = self.build_ws_url()?;
        let mut request = url.as_str().into_client_request()?;

        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", api_key.as_str()))
            .map_err(|_| {
                RealtimeError::InvalidConfiguration(
                    "OpenAI API key contains invalid header characters".to_string(),
                )
            })?;
        bearer.set_sensitive(true);

        let headers = request.headers_mut();
        headers.insert(http::header::AUTHORIZATION, bearer);
        headers.insert(
            "OpenAI-Beta",
            HeaderValue::from_static(OPENAI_BETA_HEADER_VALUE),
        );

        Ok(request)
    }

    /// Open one upstream socket and wait for the handshake to complete.
    ///
    /// On timeout the in-flight handshake future is dropped together with
    /// its TCP stream.
    pub async fn connect(&self) -> RealtimeResult<(UpstreamSink, UpstreamStream)> {
        let request = self.build_request()?;
        let limit = self.handshake_timeout();

        let (socket, response) =
            tokio::time::timeout(limit, tokio_tungstenite::connect_async(request))
                .await
                .map_err(|_| {
                    RealtimeError::Timeout(format!(
                        "upstream handshake exceeded {} ms",
                        limit.as_millis()
                    ))
                })??;

        tracing::info!(
            status = %response.status(),
            model = %self.settings.model,
            "Connected to OpenAI Realtime API"
        );

        Ok(socket.split())
    }

    /// The `session.update` event sent right after the handshake.
    pub fn session_update(&self, instructions: String) -> ClientEvent {
        let vad = &self.settings.vad;
        ClientEvent::SessionUpdate {
            session: SessionConfig {
                instructions: Some(instructions),
                voice: Some(self.settings.voice.as_str().to_string()),
                input_audio_format: Some(self.settings.input_audio_format.as_str().to_string()),
                output_audio_format: Some(
                    self.settings.output_audio_format.as_str().to_string(),
                ),
                input_audio_transcription: Some(InputAudioTranscription {
                    model: self.settings.transcription_model.clone(),
                }),
                turn_detection: Some(TurnDetection::ServerVad {
                    threshold: vad.threshold,
                    prefix_padding_ms: vad.prefix_padding_ms,
                    silence_duration_ms: vad.silence_duration_ms,
                }),
            },
        }
    }
}
