//! `/metrics` and `/health` endpoints.

use std::net::SocketAddr;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, TextEncoder};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{TelemetryError, TelemetryResult};

/// Text exposition of every registered metric.
pub fn render_metrics() -> TelemetryResult<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
}

async fn metrics_handler() -> Response {
    match render_metrics() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            warn!(error = %e, "Metrics encoding failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

pub fn metrics_router() -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
}

/// Serve the metrics router on `addr` until `shutdown` is cancelled.
pub async fn serve_metrics(addr: SocketAddr, shutdown: CancellationToken) -> TelemetryResult<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Metrics server listening");
    axum::serve(listener, metrics_router())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use std::time::Duration;

    #[test]
    fn test_render_contains_recorded_series() {
        Metrics::quote_computed("RENDER-USD");
        let text = render_metrics().unwrap();
        assert!(text.contains("extmm_quotes_total"));
        assert!(text.contains("RENDER-USD"));
    }

    #[tokio::test]
    async fn test_serves_metrics_and_health() {
        Metrics::fill("HTTP-USD", "SELL");
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let token = CancellationToken::new();
        let server = tokio::spawn(serve_metrics(addr, token.clone()));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let health = reqwest::get(format!("http://{addr}/health")).await.unwrap();
        assert_eq!(health.text().await.unwrap(), "ok");

        let metrics = reqwest::get(format!("http://{addr}/metrics")).await.unwrap();
        assert!(metrics.status().is_success());
        assert!(metrics.text().await.unwrap().contains("extmm_fills_total"));

        token.cancel();
        let result = tokio::time::timeout(Duration::from_secs(5), server).await.unwrap().unwrap();
        assert!(result.is_ok());
    }
}
