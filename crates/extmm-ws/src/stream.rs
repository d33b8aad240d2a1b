//! Long-lived stream client.
//!
//! Connects to one of the configured candidates, forwards every text frame to
//! an mpsc channel and reconnects through `ReconnectMachine` until shutdown.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::connect_async_tls_with_config;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backoff::Backoff;
use crate::error::{WsError, WsResult};
use crate::reconnect::ReconnectMachine;

#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Label used in logs.
    pub name: String,
    pub candidates: Vec<String>,
    pub headers: Vec<(String, String)>,
    pub ping_interval: Duration,
    /// Stream is considered dead after this long without any frame.
    pub idle_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl StreamConfig {
    pub fn new(name: impl Into<String>, candidates: Vec<String>) -> Self {
        Self {
            name: name.into(),
            candidates,
            headers: Vec::new(),
            ping_interval: Duration::from_secs(15),
            idle_timeout: Duration::from_secs(30),
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(8),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

enum StreamEnd {
    Shutdown,
    ReceiverDropped,
    Disconnected,
}

pub struct StreamClient {
    config: StreamConfig,
    shutdown: CancellationToken,
}

impl StreamClient {
    pub fn new(config: StreamConfig, shutdown: CancellationToken) -> Self {
        Self { config, shutdown }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Run until shutdown or until the receiver is dropped.
    ///
    /// Connection errors never end the loop; only an empty candidate list or
    /// an invalid header does.
    pub async fn run(&self, tx: mpsc::Sender<String>) -> WsResult<()> {
        let backoff = Backoff::new(self.config.backoff_base, self.config.backoff_max);
        let mut machine = ReconnectMachine::new(self.config.candidates.clone(), backoff)?;
        let name = self.config.name.as_str();

        loop {
            if self.shutdown.is_cancelled() {
                info!(stream = name, "Shutdown requested, exiting stream loop");
                return Ok(());
            }

            let url = machine.target().to_string();
            match self.stream_once(&url, &mut machine, &tx).await {
                Ok(StreamEnd::Shutdown) => return Ok(()),
                Ok(StreamEnd::ReceiverDropped) => {
                    warn!(stream = name, "Receiver dropped, stopping stream");
                    return Ok(());
                }
                Ok(StreamEnd::Disconnected) => info!(stream = name, url = %url, "Stream ended"),
                Err(e @ WsError::InvalidHeader { .. }) => return Err(e),
                Err(e) => error!(stream = name, url = %url, error = %e, "Stream error"),
            }

            if let Some(delay) = machine.on_failure() {
                warn!(stream = name, delay_ms = delay.as_millis() as u64, "Reconnecting after backoff");
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = self.shutdown.cancelled() => {
                        info!(stream = name, "Shutdown requested during backoff");
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn stream_once(
        &self,
        url: &str,
        machine: &mut ReconnectMachine,
        tx: &mpsc::Sender<String>,
    ) -> WsResult<StreamEnd> {
        let name = self.config.name.as_str();
        let mut request = url.into_client_request()?;
        for (key, value) in &self.config.headers {
            let header = HeaderName::from_bytes(key.as_bytes()).map_err(|e| WsError::InvalidHeader {
                name: key.clone(),
                reason: e.to_string(),
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| WsError::InvalidHeader {
                name: key.clone(),
                reason: e.to_string(),
            })?;
            request.headers_mut().insert(header, value);
        }

        info!(stream = name, url = %url, "Connecting");
        let connect = connect_async_tls_with_config(request, None, true, None);
        let (ws_stream, _response) = tokio::select! {
            result = connect => result?,
            () = self.shutdown.cancelled() => return Ok(StreamEnd::Shutdown),
        };
        let (mut write, mut read) = ws_stream.split();
        machine.on_connected();
        info!(stream = name, url = %url, "Connected");

        let mut ping = tokio::time::interval(self.config.ping_interval);
        ping.tick().await;
        let mut last_frame = tokio::time::Instant::now();

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    if let Err(e) = write.send(Message::Close(None)).await {
                        debug!(stream = name, error = %e, "Close frame not sent");
                    }
                    return Ok(StreamEnd::Shutdown);
                }

                frame = read.next() => {
                    last_frame = tokio::time::Instant::now();
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            if tx.send(text).await.is_err() {
                                return Ok(StreamEnd::ReceiverDropped);
                            }
                        }
                        Some(Ok(Message::Ping(data))) => write.send(Message::Pong(data)).await?,
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(StreamEnd::Disconnected),
                    }
                }

                _ = ping.tick() => {
                    if last_frame.elapsed() > self.config.idle_timeout {
                        return Err(WsError::HeartbeatTimeout);
                    }
                    write.send(Message::Ping(Vec::new())).await?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = StreamConfig::new("account", vec!["ws://a".into()]).with_header("X-Api-Key", "k");
        assert_eq!(config.ping_interval, Duration::from_secs(15));
        assert_eq!(config.backoff_base, Duration::from_millis(500));
        assert_eq!(config.backoff_max, Duration::from_secs(8));
        assert_eq!(config.headers, vec![("X-Api-Key".to_string(), "k".to_string())]);
    }

    #[tokio::test]
    async fn test_invalid_header_is_fatal() {
        let config = StreamConfig::new("bad", vec!["ws://127.0.0.1:1".into()]).with_header("X-Api-Key", "bad\nvalue");
        let client = StreamClient::new(config, CancellationToken::new());
        let (tx, _rx) = mpsc::channel(1);
        let result = client.run(tx).await;
        assert!(matches!(result, Err(WsError::InvalidHeader { .. })));
    }

    #[tokio::test]
    async fn test_shutdown_during_backoff() {
        let mut config = StreamConfig::new("down", vec!["ws://127.0.0.1:1".into()]);
        config.backoff_base = Duration::from_secs(60);
        let token = CancellationToken::new();
        let client = StreamClient::new(config, token.clone());
        let (tx, _rx) = mpsc::channel(1);

        let handle = tokio::spawn(async move { client.run(tx).await });
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
        let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }
}
