//! REST client with bounded retry.
//!
//! Connect errors, timeouts and HTTP 429 are retried up to `max_attempts`
//! with delays of `base * 2^(n-1)` capped at `max`. Every other non-success
//! status fails immediately.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{RegistryError, RegistryResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RestConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub user_agent: String,
    pub subaccount_id: Option<String>,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub timeout: Duration,
}

impl RestConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            user_agent: "extended-mm-bot/0.1".to_string(),
            subaccount_id: None,
            max_attempts: 5,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(8),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Delay before retry number `attempt` (1-based).
pub fn retry_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << exponent).min(max)
}

pub struct RestClient {
    client: Client,
    config: RestConfig,
}

impl RestClient {
    pub fn new(config: RestConfig) -> RegistryResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value(&config.user_agent)?);
        if let Some(key) = &config.api_key {
            headers.insert(HeaderName::from_static("x-api-key"), header_value(key)?);
        }
        if let Some(sub) = &config.subaccount_id {
            headers.insert(HeaderName::from_static("x-subaccount-id"), header_value(sub)?);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| RegistryError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub async fn get_json(&self, path: &str, query: &[(&str, String)]) -> RegistryResult<Value> {
        self.send(Method::GET, path, query, None).await
    }

    pub async fn post_json(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> RegistryResult<Value> {
        self.send(Method::POST, path, query, body).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> RegistryResult<Value> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let mut request = self.client.request(method.clone(), &url).query(query);
            if let Some(body) = body {
                request = request.json(body);
            }

            let retry_reason = match request.send().await {
                Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                    if attempt >= max_attempts {
                        return Err(RegistryError::RateLimited { attempts: attempt });
                    }
                    "rate limited".to_string()
                }
                Ok(response) if !response.status().is_success() => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    return Err(RegistryError::Status { status, body });
                }
                Ok(response) => {
                    let text = response
                        .text()
                        .await
                        .map_err(|e| RegistryError::HttpClient(format!("Failed to read body: {e}")))?;
                    debug!(method = %method, path, attempt, "REST call succeeded");
                    if text.trim().is_empty() {
                        return Ok(Value::Null);
                    }
                    return Ok(serde_json::from_str(&text)?);
                }
                Err(e) if e.is_connect() || e.is_timeout() => {
                    if attempt >= max_attempts {
                        return Err(RegistryError::Transport {
                            attempts: attempt,
                            source: e,
                        });
                    }
                    e.to_string()
                }
                Err(e) => {
                    return Err(RegistryError::Transport {
                        attempts: attempt,
                        source: e,
                    })
                }
            };

            let delay = retry_delay(attempt, self.config.backoff_base, self.config.backoff_max);
            warn!(
                method = %method,
                path,
                attempt,
                delay_ms = delay.as_millis() as u64,
                reason = %retry_reason,
                "Retrying REST call"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

fn header_value(value: &str) -> RegistryResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| RegistryError::HttpClient(format!("Invalid header value: {e}")))
}
