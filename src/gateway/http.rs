//! Shared outbound HTTP client with timeout and bounded exponential backoff.
//! Retries live here and nowhere else; the reconciler itself never retries.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("network error: {message}")]
    Network { message: String },
    #[error("rate limited by upstream")]
    RateLimited,
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid JSON response: {message}")]
    InvalidJson { message: String },
}

impl HttpError {
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            HttpError::Network { .. } | HttpError::RateLimited => true,
            HttpError::Status { status, .. } => *status >= 500,
            HttpError::InvalidJson { .. } => false,
        }
    }
}

/// Authentication for an outbound request.
#[derive(Debug, Clone)]
pub enum Auth {
    Basic { username: String, password: String },
    Bearer(String),
}

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
    max_retries: u32,
}

impl HttpClient {
    pub fn new(timeout: Duration, max_retries: u32) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HttpError::Network {
                message: format!("failed to initialize HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            timeout,
            max_retries,
        })
    }

    /// Send a JSON request and decode the JSON response. Retries on network
    /// errors, 429 and 5xx with exponential backoff; 4xx is returned to the
    /// caller immediately so it can inspect the status.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        auth: Option<&Auth>,
        body: Option<&JsonValue>,
    ) -> Result<T, HttpError> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            let mut request = self.client.request(method.clone(), url);
            request = request.timeout(self.timeout);

            match auth {
                Some(Auth::Basic { username, password }) => {
                    request = request.basic_auth(username, Some(password));
                }
                Some(Auth::Bearer(token)) => {
                    request = request.bearer_auth(token);
                }
                None => {}
            }
            if let Some(payload) = body {
                request = request.json(payload);
            }

            let response = request.send().await.map_err(|e| HttpError::Network {
                message: format!("request to {} failed: {}", url, e),
            });

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_success() {
                        return serde_json::from_str::<T>(&text).map_err(|e| {
                            HttpError::InvalidJson {
                                message: e.to_string(),
                            }
                        });
                    }

                    if status.as_u16() == 429 {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                            continue;
                        }
                        return Err(HttpError::RateLimited);
                    }

                    if status.is_server_error() && attempt < self.max_retries {
                        warn!(
                            status = %status,
                            attempt = attempt + 1,
                            "upstream server error, retrying"
                        );
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }

                    return Err(HttpError::Status {
                        status: status.as_u16(),
                        body: text,
                    });
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(HttpError::Network {
            message: "request failed".to_string(),
        }))
    }
}
