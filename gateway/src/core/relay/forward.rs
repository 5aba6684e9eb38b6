//! Relay core: translate one classified frame for the opposite side.
//!
//! Forwarding is a pure function of the frame; the session loop performs the
//! actual send so that each frame is relayed before the next one is read.

use std::io::Cursor;

use axum::extract::ws::Message as ClientMessage;
use bytes::Bytes;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;
use tracing::{debug, error, trace, warn};

use super::frame::{Direction, Frame};
use crate::config::DownstreamAudioMode;
use crate::core::realtime::openai::{ClientEvent, ServerEventHeader};

/// Per-session settings consulted on every hop.
#[derive(Debug, Clone)]
pub struct RelayContext {
    pub session_id: String,
    pub log_payloads: bool,
    pub downstream_audio: DownstreamAudioMode,
    pub downstream_sample_rate: u32,
}

/// Translate a client frame into the message the upstream expects.
///
/// Control frames pass through unchanged. Audio frames become an
/// `input_audio_buffer.append` event. Returns `None` when the frame is
/// dropped; the reason is logged.
pub fn to_upstream(frame: Frame, ctx: &RelayContext) -> Option<UpstreamMessage> {
    let direction = Direction::ClientToUpstream;
    match frame {
        Frame::Control(control) => {
            debug!(
                session_id = %ctx.session_id,
                direction = %direction,
                frame_type = control.event_type_or_unknown(),
                bytes = control.text.len(),
                "Relaying control frame"
            );
            if ctx.log_payloads {
                trace!(session_id = %ctx.session_id, payload = %control.text, "Control payload");
            }
            Some(UpstreamMessage::Text(control.text.into()))
        }
        Frame::Audio(audio) => {
            if audio.is_empty() {
                debug!(
                    session_id = %ctx.session_id,
                    direction = %direction,
                    "Dropping empty audio frame"
                );
                return None;
            }

            let event = ClientEvent::audio_append(&audio);
            match event.to_json() {
                Ok(json) => {
                    debug!(
                        session_id = %ctx.session_id,
                        direction = %direction,
                        frame_type = event.event_type(),
                        bytes = audio.len(),
                        "Relaying audio frame"
                    );
                    Some(UpstreamMessage::Text(json.into()))
                }
                Err(e) => {
                    warn!(
                        session_id = %ctx.session_id,
                        direction = %direction,
                        bytes = audio.len(),
                        "Dropping audio frame, failed to encode append event: {e}"
                    );
                    None
                }
            }
        }
    }
}

/// Translate an upstream frame into the message the client expects.
///
/// Upstream `error` events are logged with their inner detail and still
/// forwarded so the client can react.
pub fn to_client(frame: Frame, ctx: &RelayContext) -> Option<ClientMessage> {
    let direction = Direction::UpstreamToClient;
    match frame {
        Frame::Control(control) => {
            if control.event_type.as_deref() == Some("error") {
                log_upstream_error(&control.text, ctx);
            }

            debug!(
                session_id = %ctx.session_id,
                direction = %direction,
                frame_type = control.event_type_or_unknown(),
                bytes = control.text.len(),
                "Relaying control frame"
            );
            if ctx.log_payloads {
                trace!(session_id = %ctx.session_id, payload = %control.text, "Control payload");
            }
            Some(ClientMessage::Text(control.text.into()))
        }
        Frame::Audio(audio) => {
            if audio.is_empty() {
                debug!(
                    session_id = %ctx.session_id,
                    direction = %direction,
                    "Dropping empty audio frame"
                );
                return None;
            }

            let payload = match ctx.downstream_audio {
                DownstreamAudioMode::Passthrough => audio,
                DownstreamAudioMode::Wav => {
                    match wrap_pcm16_wav(&audio, ctx.downstream_sample_rate) {
                        Ok(wrapped) => wrapped,
                        Err(e) => {
                            warn!(
                                session_id = %ctx.session_id,
                                bytes = audio.len(),
                                "Forwarding audio unwrapped, WAV encoding failed: {e}"
                            );
                            audio
                        }
                    }
                }
            };

            debug!(
                session_id = %ctx.session_id,
                direction = %direction,
                frame_type = ctx.downstream_audio.as_str(),
                bytes = payload.len(),
                "Relaying audio frame"
            );
            Some(ClientMessage::Binary(payload))
        }
    }
}

fn log_upstream_error(text: &str, ctx: &RelayContext) {
    match serde_json::from_str::<ServerEventHeader>(text) {
        Ok(ServerEventHeader {
            error: Some(detail),
            ..
        }) => {
            error!(
                session_id = %ctx.session_id,
                error_type = detail.error_type.as_deref().unwrap_or("unknown"),
                code = detail.code.as_deref().unwrap_or(""),
                param = detail.param.as_deref().unwrap_or(""),
                "Upstream reported an error: {}",
                detail.message
            );
        }
        _ => {
            error!(
                session_id = %ctx.session_id,
                "Upstream reported an error without detail"
            );
        }
    }
}

/// Wrap little-endian pcm16 mono samples in a minimal WAV container.
pub fn wrap_pcm16_wav(pcm: &[u8], sample_rate: u32) -> Result<Bytes, hound::Error> {
    if pcm.len() % 2 != 0 {
        return Err(hound::Error::UnfinishedSample);
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(pcm.len() + 44));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for pair in pcm.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([pair[0], pair[1]]))?;
        }
        writer.finalize()?;
    }

    Ok(Bytes::from(cursor.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::relay::frame::{ControlFrame, strip_wav_container};
    use base64::prelude::*;

    fn ctx(mode: DownstreamAudioMode) -> RelayContext {
        RelayContext {
            session_id: "1-1700000000000".to_string(),
            log_payloads: false,
            downstream_audio: mode,
            downstream_sample_rate: 24000,
        }
    }

    fn control(text: &str, event_type: Option<&str>) -> Frame {
        Frame::Control(ControlFrame {
            text: text.to_string(),
            event_type: event_type.map(str::to_string),
        })
    }

    #[test]
    fn test_client_control_forwarded_verbatim() {
        let text = r#"{"type":"input_audio_buffer.commit","event_id":"e1"}"#;
        let message = to_upstream(
            control(text, Some("input_audio_buffer.commit")),
            &ctx(DownstreamAudioMode::Passthrough),
        )
        .unwrap();
        assert_eq!(message, UpstreamMessage::Text(text.into()));
    }

    #[test]
    fn test_client_audio_wrapped_as_append() {
        let audio: Vec<u8> = (0..=255u8).cycle().take(4000).collect();
        let message = to_upstream(
            Frame::Audio(Bytes::from(audio.clone())),
            &ctx(DownstreamAudioMode::Passthrough),
        )
        .unwrap();

        let UpstreamMessage::Text(text) = message else {
            panic!("Expected text message");
        };
        let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(value["type"], "input_audio_buffer.append");
        let decoded = BASE64_STANDARD
            .decode(value["audio"].as_str().unwrap())
            .unwrap();
        assert_eq!(decoded, audio);
    }

    #[test]
    fn test_empty_audio_dropped() {
        assert!(
            to_upstream(
                Frame::Audio(Bytes::new()),
                &ctx(DownstreamAudioMode::Passthrough)
            )
            .is_none()
        );
        assert!(
            to_client(
                Frame::Audio(Bytes::new()),
                &ctx(DownstreamAudioMode::Passthrough)
            )
            .is_none()
        );
    }

    #[test]
    fn test_upstream_error_forwarded_unchanged() {
        let text = r#"{"type":"error","error":{"type":"invalid_request_error","message":"bad"}}"#;
        let message = to_client(
            control(text, Some("error")),
            &ctx(DownstreamAudioMode::Passthrough),
        )
        .unwrap();
        assert_eq!(message, ClientMessage::Text(text.into()));
    }

    #[test]
    fn test_upstream_audio_passthrough() {
        let audio = Bytes::from_static(&[1, 0, 2, 0]);
        let message = to_client(
            Frame::Audio(audio.clone()),
            &ctx(DownstreamAudioMode::Passthrough),
        )
        .unwrap();
        assert_eq!(message, ClientMessage::Binary(audio));
    }

    #[test]
    fn test_upstream_audio_wav_wrapped() {
        let audio = Bytes::from_static(&[1, 0, 2, 0, 0xff, 0x7f]);
        let message = to_client(Frame::Audio(audio.clone()), &ctx(DownstreamAudioMode::Wav)).unwrap();

        let ClientMessage::Binary(wrapped) = message else {
            panic!("Expected binary message");
        };
        assert_eq!(&wrapped[0..4], b"RIFF");
        assert_eq!(wrapped.len(), 44 + audio.len());
        assert_eq!(strip_wav_container(wrapped), audio);
    }

    #[test]
    fn test_odd_length_audio_not_wrapped() {
        let audio = Bytes::from_static(&[1, 2, 3]);
        assert!(wrap_pcm16_wav(&audio, 24000).is_err());

        let message = to_client(Frame::Audio(audio.clone()), &ctx(DownstreamAudioMode::Wav)).unwrap();
        assert_eq!(message, ClientMessage::Binary(audio));
    }
}
