//! Remote fetch client: the single seam through which the cache and the
//! mutation coordinator reach the server.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::error::ApiError;
use crate::config::ServerConfig;

/// Issues a request and returns the parsed JSON body.
///
/// An empty success body parses as `Value::Null`. Failures carry a
/// human-readable message (see [`ApiError::message`]).
#[async_trait]
pub trait RemoteFetch: Send + Sync {
  async fn request(
    &self,
    method: Method,
    path: &str,
    body: Option<Value>,
  ) -> Result<Value, ApiError>;
}

/// Convert a JSON body into a typed value.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
  serde_json::from_value(value).map_err(ApiError::from)
}

/// Error body returned by the server on 4xx/5xx.
#[derive(Debug, Deserialize)]
struct ErrorBody {
  #[serde(default)]
  message: String,
}

/// HTTP implementation of [`RemoteFetch`] backed by reqwest.
#[derive(Clone)]
pub struct HttpClient {
  http: reqwest::Client,
  base: String,
  token: Option<String>,
}

impl HttpClient {
  pub fn new(config: &ServerConfig, token: Option<String>) -> Result<Self> {
    let base = Url::parse(&config.url)
      .map_err(|e| eyre!("Invalid server url {}: {}", config.url, e))?;
    if !matches!(base.scheme(), "http" | "https") {
      return Err(eyre!("Unsupported server url scheme: {}", base.scheme()));
    }

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .user_agent(concat!("d9s/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base: base.as_str().trim_end_matches('/').to_string(),
      token,
    })
  }

  /// Server base url without trailing slash.
  pub fn base_url(&self) -> &str {
    &self.base
  }

  fn url(&self, path: &str) -> Result<Url, ApiError> {
    Url::parse(&format!("{}{}", self.base, path))
      .map_err(|e| ApiError::network(format!("invalid request path {}: {}", path, e)))
  }
}

#[async_trait]
impl RemoteFetch for HttpClient {
  async fn request(
    &self,
    method: Method,
    path: &str,
    body: Option<Value>,
  ) -> Result<Value, ApiError> {
    let url = self.url(path)?;
    debug!(%method, %url, "request");

    let mut builder = self.http.request(method.clone(), url);
    if let Some(token) = &self.token {
      builder = builder.bearer_auth(token);
    }
    if let Some(body) = &body {
      builder = builder.json(body);
    }

    let response = builder
      .send()
      .await
      .map_err(|e| ApiError::network(e.to_string()))?;
    let status = response.status();
    let bytes = response
      .bytes()
      .await
      .map_err(|e| ApiError::network(e.to_string()))?;

    if !status.is_success() {
      let message = serde_json::from_slice::<ErrorBody>(&bytes)
        .ok()
        .map(|b| b.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
          status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
        });
      warn!(%method, path, status = status.as_u16(), %message, "request failed");
      return Err(ApiError::status(status.as_u16(), message));
    }

    if bytes.is_empty() {
      return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(ApiError::from)
  }
}
