//! Stream client against a local WebSocket server.

use std::time::Duration;

use extmm_ws::{CancellationToken, StreamClient, StreamConfig};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Accepts connections and sends `frames` on each, then closes.
async fn spawn_server(frames: Vec<&'static str>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let frames = frames.clone();
            tokio::spawn(async move {
                let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
                for frame in frames {
                    ws.send(Message::Text(frame.to_string())).await.unwrap();
                }
                let _ = ws.close(None).await;
                while ws.next().await.is_some() {}
            });
        }
    });
    format!("ws://{addr}")
}

async fn unused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{addr}")
}

#[tokio::test]
async fn test_frames_forwarded_in_order() {
    let url = spawn_server(vec![r#"{"n":1}"#, r#"{"n":2}"#]).await;
    let token = CancellationToken::new();
    let client = StreamClient::new(StreamConfig::new("local", vec![url]), token.clone());
    let (tx, mut rx) = mpsc::channel(16);
    let handle = tokio::spawn(async move { client.run(tx).await });

    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
    let second = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
    assert_eq!(first.as_deref(), Some(r#"{"n":1}"#));
    assert_eq!(second.as_deref(), Some(r#"{"n":2}"#));

    token.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_dead_candidate_is_skipped() {
    let dead = unused_url().await;
    let live = spawn_server(vec!["hello"]).await;
    let token = CancellationToken::new();
    let config = StreamConfig::new("failover", vec![dead, live]).with_header("X-Api-Key", "test");
    let client = StreamClient::new(config, token.clone());
    let (tx, mut rx) = mpsc::channel(16);
    tokio::spawn(async move { client.run(tx).await });

    let frame = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
    assert_eq!(frame.as_deref(), Some("hello"));
    token.cancel();
}

#[tokio::test]
async fn test_reconnects_after_server_close() {
    let url = spawn_server(vec!["tick"]).await;
    let token = CancellationToken::new();
    let client = StreamClient::new(StreamConfig::new("again", vec![url]), token.clone());
    let (tx, mut rx) = mpsc::channel(16);
    tokio::spawn(async move { client.run(tx).await });

    // one frame per connection; the second needs a reconnect after 0.5s
    for _ in 0..2 {
        let frame = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(frame.as_deref(), Some("tick"));
    }
    token.cancel();
}

#[tokio::test]
async fn test_stops_when_receiver_dropped() {
    let url = spawn_server(vec!["a", "b", "c"]).await;
    let client = StreamClient::new(StreamConfig::new("dropped", vec![url]), CancellationToken::new());
    let (tx, rx) = mpsc::channel(1);
    drop(rx);
    let result = tokio::time::timeout(Duration::from_secs(5), client.run(tx)).await.unwrap();
    assert!(result.is_ok());
}
