//! End-to-end voice relay tests against a mock realtime upstream.

mod mock_upstream;

use std::io::Cursor;
use std::time::Duration;

use base64::prelude::*;
use bytes::Bytes;
use futures_util::SinkExt;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

use mock_upstream::{
    Behavior, Received, TEST_API_KEY, connect_client, gateway_config, next_message,
    spawn_gateway, spawn_mock_upstream, wait_until,
};

const WAIT: Duration = Duration::from_secs(5);

fn error_message(message: &Message) -> String {
    let Message::Text(text) = message else {
        panic!("Expected error text frame, got {message:?}");
    };
    let value: Value = serde_json::from_str(text.as_str()).unwrap();
    assert_eq!(value["type"], "error");
    value["error"]["message"].as_str().unwrap().to_string()
}

fn close_code(message: &Message) -> u16 {
    match message {
        Message::Close(Some(frame)) => u16::from(frame.code),
        other => panic!("Expected close frame, got {other:?}"),
    }
}

fn append_audio(frame: &Received) -> Vec<u8> {
    let value = frame.json();
    assert_eq!(value["type"], "input_audio_buffer.append");
    BASE64_STANDARD
        .decode(value["audio"].as_str().unwrap())
        .unwrap()
}

#[tokio::test]
async fn test_unknown_post_rejected_without_upstream() {
    let upstream = spawn_mock_upstream(Behavior::Quiet, Duration::ZERO).await;
    let (addr, _state) = spawn_gateway(gateway_config(&upstream.url, 5000)).await;

    let mut client = connect_client(addr, "?postId=42").await;

    assert_eq!(error_message(&next_message(&mut client).await), "Invalid postId");
    assert_eq!(close_code(&next_message(&mut client).await), 1008);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(upstream.record.connection_count(), 0);
}

#[tokio::test]
async fn test_missing_post_id_rejected() {
    let upstream = spawn_mock_upstream(Behavior::Quiet, Duration::ZERO).await;
    let (addr, _state) = spawn_gateway(gateway_config(&upstream.url, 5000)).await;

    for query in ["", "?postId=", "?postId=%20"] {
        let mut client = connect_client(addr, query).await;
        assert_eq!(
            error_message(&next_message(&mut client).await),
            "postId required in URL"
        );
        assert_eq!(close_code(&next_message(&mut client).await), 1008);
    }
    assert_eq!(upstream.record.connection_count(), 0);
}

#[tokio::test]
async fn test_handshake_timeout_reports_failure() {
    let upstream = spawn_mock_upstream(Behavior::Quiet, Duration::from_secs(3)).await;
    let (addr, state) = spawn_gateway(gateway_config(&upstream.url, 300)).await;

    let mut client = connect_client(addr, "?postId=1").await;

    assert_eq!(
        error_message(&next_message(&mut client).await),
        "Failed to connect to upstream"
    );
    assert_eq!(close_code(&next_message(&mut client).await), 1011);

    assert_eq!(upstream.record.connection_count(), 1);
    assert!(upstream.record.frames().is_empty());
    wait_until(WAIT, || state.ws_connection_count() == 0).await;
}

#[tokio::test]
async fn test_client_leaving_during_handshake_abandons_upstream() {
    let upstream = spawn_mock_upstream(Behavior::Quiet, Duration::from_millis(1500)).await;
    let (addr, state) = spawn_gateway(gateway_config(&upstream.url, 5000)).await;

    let mut client = connect_client(addr, "?postId=1").await;
    client
        .send(Message::Binary(Bytes::from_static(&[1, 0, 2, 0])))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    drop(client);

    wait_until(WAIT, || state.ws_connection_count() == 0).await;
    tokio::time::sleep(Duration::from_millis(2500)).await;

    assert_eq!(upstream.record.connection_count(), 1);
    assert!(upstream.record.frames().is_empty());
}

#[tokio::test]
async fn test_audio_sent_during_handshake_follows_configuration() {
    let upstream = spawn_mock_upstream(Behavior::Quiet, Duration::from_millis(500)).await;
    let (addr, _state) = spawn_gateway(gateway_config(&upstream.url, 5000)).await;

    let mut client = connect_client(addr, "?postId=2").await;
    let control = r#"{"type":"input_audio_buffer.commit"}"#;
    client
        .send(Message::Binary(Bytes::from_static(&[1, 0, 2, 0])))
        .await
        .unwrap();
    client.send(Message::Text(control.into())).await.unwrap();
    client
        .send(Message::Binary(Bytes::from_static(&[3, 0, 4, 0])))
        .await
        .unwrap();

    let record = upstream.record.clone();
    wait_until(WAIT, || record.frames().len() >= 4).await;
    let frames = upstream.record.frames();

    assert_eq!(frames[0].event_type(), Some("session.update"));
    assert_eq!(append_audio(&frames[1]), vec![1, 0, 2, 0]);
    assert_eq!(frames[2].event_type(), Some("input_audio_buffer.commit"));
    assert_eq!(append_audio(&frames[3]), vec![3, 0, 4, 0]);
}

#[tokio::test]
async fn test_unreachable_upstream_reports_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead_url = format!("ws://{}/v1/realtime", listener.local_addr().unwrap());
    drop(listener);
    let (addr, _state) = spawn_gateway(gateway_config(&dead_url, 5000)).await;

    let mut client = connect_client(addr, "?postId=2").await;

    assert_eq!(
        error_message(&next_message(&mut client).await),
        "Failed to connect to upstream"
    );
    assert_eq!(close_code(&next_message(&mut client).await), 1011);
}

#[tokio::test]
async fn test_configuration_precedes_audio() {
    let upstream = spawn_mock_upstream(Behavior::Quiet, Duration::from_millis(300)).await;
    let (addr, _state) = spawn_gateway(gateway_config(&upstream.url, 5000)).await;

    let mut client = connect_client(addr, "?postId=1").await;
    let chunks: Vec<Vec<u8>> = (0..3u8)
        .map(|i| (0..4000).map(|j| (j as u8).wrapping_mul(i + 1)).collect())
        .collect();
    for chunk in &chunks {
        client
            .send(Message::Binary(Bytes::from(chunk.clone())))
            .await
            .unwrap();
    }

    let record = upstream.record.clone();
    wait_until(WAIT, || record.frames().len() >= 4).await;
    let frames = upstream.record.frames();

    assert_eq!(frames.len(), 4);
    let config = frames[0].json();
    assert_eq!(config["type"], "session.update");
    let session = &config["session"];
    assert_eq!(session["voice"], "alloy");
    assert_eq!(session["input_audio_format"], "pcm16");
    assert_eq!(session["output_audio_format"], "pcm16");
    assert_eq!(session["input_audio_transcription"]["model"], "whisper-1");
    assert_eq!(session["turn_detection"]["type"], "server_vad");
    assert_eq!(session["turn_detection"]["threshold"], 0.5);
    assert_eq!(session["turn_detection"]["prefix_padding_ms"], 300);
    assert_eq!(session["turn_detection"]["silence_duration_ms"], 500);
    assert!(
        session["instructions"]
            .as_str()
            .unwrap()
            .contains(r#""post_id": "1""#)
    );

    let forwarded: Vec<Vec<u8>> = frames[1..].iter().map(append_audio).collect();
    assert_eq!(forwarded, chunks);
    assert!(forwarded.iter().all(|chunk| chunk.len() == 4000));
}

#[tokio::test]
async fn test_upstream_receives_credentials_in_headers() {
    let upstream = spawn_mock_upstream(Behavior::Quiet, Duration::ZERO).await;
    let (addr, _state) = spawn_gateway(gateway_config(&upstream.url, 5000)).await;

    let _client = connect_client(addr, "?postId=3").await;
    let record = upstream.record.clone();
    wait_until(WAIT, || !record.frames().is_empty()).await;

    assert_eq!(
        upstream.record.header("authorization").as_deref(),
        Some(format!("Bearer {TEST_API_KEY}").as_str())
    );
    assert_eq!(
        upstream.record.header("openai-beta").as_deref(),
        Some("realtime=v1")
    );
}

#[tokio::test]
async fn test_control_and_container_frames_from_client() {
    let upstream = spawn_mock_upstream(Behavior::Quiet, Duration::ZERO).await;
    let (addr, _state) = spawn_gateway(gateway_config(&upstream.url, 5000)).await;

    let mut client = connect_client(addr, "?postId=1").await;

    let control = r#"{"type":"response.create","response":{"modalities":["audio","text"]}}"#;
    client.send(Message::Text(control.into())).await.unwrap();

    let samples: Vec<i16> = (0..100).map(|i| i * 300 - 15000).collect();
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 24000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for sample in &samples {
            writer.write_sample(*sample).unwrap();
        }
        writer.finalize().unwrap();
    }
    client
        .send(Message::Binary(Bytes::from(cursor.into_inner())))
        .await
        .unwrap();

    let pcm = [5u8, 0, 6, 0];
    client
        .send(Message::Text(BASE64_STANDARD.encode(pcm).into()))
        .await
        .unwrap();

    let record = upstream.record.clone();
    wait_until(WAIT, || record.frames().len() >= 4).await;
    let frames = upstream.record.frames();

    assert_eq!(frames[0].event_type(), Some("session.update"));
    assert_eq!(
        frames[1].json(),
        &serde_json::from_str::<Value>(control).unwrap()
    );
    let expected_pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    assert_eq!(append_audio(&frames[2]), expected_pcm);
    assert_eq!(append_audio(&frames[3]), pcm.to_vec());
}

#[tokio::test]
async fn test_upstream_events_reach_client() {
    let upstream = spawn_mock_upstream(Behavior::Greet, Duration::ZERO).await;
    let (addr, _state) = spawn_gateway(gateway_config(&upstream.url, 5000)).await;

    let mut client = connect_client(addr, "?postId=4").await;

    let Message::Text(created) = next_message(&mut client).await else {
        panic!("Expected session.created");
    };
    let created: Value = serde_json::from_str(created.as_str()).unwrap();
    assert_eq!(created["type"], "session.created");

    let error = next_message(&mut client).await;
    assert_eq!(error_message(&error), "Mock upstream error");

    assert_eq!(
        next_message(&mut client).await,
        Message::Binary(Bytes::from_static(&[1, 0, 2, 0]))
    );
}

#[tokio::test]
async fn test_client_close_closes_upstream() {
    let upstream = spawn_mock_upstream(Behavior::Quiet, Duration::ZERO).await;
    let (addr, state) = spawn_gateway(gateway_config(&upstream.url, 5000)).await;

    let mut client = connect_client(addr, "?postId=1").await;
    let record = upstream.record.clone();
    wait_until(WAIT, || !record.frames().is_empty()).await;
    assert_eq!(state.ws_connection_count(), 1);

    client.close(None).await.unwrap();

    let record = upstream.record.clone();
    wait_until(Duration::from_secs(2), || record.saw_close()).await;
    wait_until(WAIT, || state.ws_connection_count() == 0).await;
}

#[tokio::test]
async fn test_abrupt_client_drop_closes_upstream() {
    let upstream = spawn_mock_upstream(Behavior::Quiet, Duration::ZERO).await;
    let (addr, _state) = spawn_gateway(gateway_config(&upstream.url, 5000)).await;

    let client = connect_client(addr, "?postId=1").await;
    let record = upstream.record.clone();
    wait_until(WAIT, || !record.frames().is_empty()).await;

    drop(client);

    let record = upstream.record.clone();
    wait_until(Duration::from_secs(2), || record.saw_close()).await;
}

#[tokio::test]
async fn test_upstream_close_closes_client() {
    let upstream = spawn_mock_upstream(Behavior::CloseAfterConfig, Duration::ZERO).await;
    let (addr, _state) = spawn_gateway(gateway_config(&upstream.url, 5000)).await;

    let mut client = connect_client(addr, "?postId=1").await;

    assert_eq!(close_code(&next_message(&mut client).await), 1000);
}

#[tokio::test]
async fn test_upstream_reset_reports_lost_connection() {
    let upstream = spawn_mock_upstream(Behavior::ResetAfterConfig, Duration::ZERO).await;
    let (addr, state) = spawn_gateway(gateway_config(&upstream.url, 5000)).await;

    let mut client = connect_client(addr, "?postId=1").await;

    assert_eq!(
        error_message(&next_message(&mut client).await),
        "Upstream connection lost"
    );
    assert_eq!(close_code(&next_message(&mut client).await), 1011);
    wait_until(WAIT, || state.ws_connection_count() == 0).await;
}
