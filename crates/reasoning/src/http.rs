//! Thin JSON client for the OpenAI-compatible hosted API.
//!
//! One call here is one attempt: retries and the per-attempt deadline belong to
//! [`crate::retry::RetryPolicy`]. This layer only turns HTTP outcomes into the
//! error taxonomy.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{ApiKey, Config};
use crate::error::{Result, ServiceError};

/// Longest slice of an error body carried into an error message
const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  base_url: String,
  api_key: ApiKey,
}

impl ApiClient {
  pub fn new(base_url: &str, api_key: ApiKey, timeout: Duration) -> Result<Self> {
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| ServiceError::validation(format!("failed to create HTTP client: {e}")))?;

    Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string(), api_key })
  }

  pub fn from_config(config: &Config) -> Result<Self> {
    Self::new(&config.api_base_url, config.api_key.clone(), config.request_timeout())
  }

  /// POST `body` to `{base_url}{path}` and decode the JSON reply.
  pub async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp>
  where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
  {
    if self.api_key.is_empty() {
      return Err(ServiceError::auth(
        "no API key configured (set DASHSCOPE_API_KEY or REASONING_API_KEY)",
      ));
    }

    let url = format!("{}{}", self.base_url, path);
    let response = self
      .client
      .post(&url)
      .bearer_auth(self.api_key.expose())
      .json(body)
      .send()
      .await
      .map_err(|e| classify_transport(&url, e))?;

    let status = response.status();
    let text = response.text().await.map_err(|e| classify_transport(&url, e))?;

    if !status.is_success() {
      return Err(classify_status(status, &text));
    }

    serde_json::from_str(&text)
      .map_err(|e| ServiceError::malformed(format!("unexpected response from {url}: {e}")))
  }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
  error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
  message: String,
}

/// Map a non-success status to the error taxonomy.
pub fn classify_status(status: StatusCode, body: &str) -> ServiceError {
  let detail = format!("HTTP {}: {}", status.as_u16(), error_detail(body));

  match status {
    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ServiceError::auth(detail),
    StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => ServiceError::transient(detail),
    s if s.is_server_error() => ServiceError::transient(detail),
    s if s.is_client_error() => ServiceError::validation(detail),
    _ => ServiceError::malformed(detail),
  }
}

/// Prefer the provider's own error message over the raw body.
fn error_detail(body: &str) -> String {
  if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
    return envelope.error.message;
  }
  let body = body.trim();
  if body.is_empty() {
    return "empty response body".to_string();
  }
  body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

fn classify_transport(url: &str, error: reqwest::Error) -> ServiceError {
  if error.is_timeout() {
    ServiceError::transient(format!("request to {url} timed out"))
  } else if error.is_decode() {
    ServiceError::malformed(format!("could not read response from {url}: {error}"))
  } else {
    ServiceError::transient(format!("request to {url} failed: {error}"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_status_classification() {
    assert!(matches!(classify_status(StatusCode::UNAUTHORIZED, ""), ServiceError::Auth { .. }));
    assert!(matches!(classify_status(StatusCode::FORBIDDEN, ""), ServiceError::Auth { .. }));
    assert!(matches!(
      classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
      ServiceError::Transient { .. }
    ));
    assert!(matches!(
      classify_status(StatusCode::REQUEST_TIMEOUT, ""),
      ServiceError::Transient { .. }
    ));
    assert!(matches!(
      classify_status(StatusCode::BAD_GATEWAY, ""),
      ServiceError::Transient { .. }
    ));
    assert!(matches!(
      classify_status(StatusCode::BAD_REQUEST, ""),
      ServiceError::Validation { .. }
    ));
  }

  #[test]
  fn test_provider_error_message_is_extracted() {
    let body = json!({"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}})
      .to_string();
    let error = classify_status(StatusCode::UNAUTHORIZED, &body);
    assert_eq!(error.message(), "HTTP 401: Incorrect API key provided");
  }

  #[test]
  fn test_long_bodies_are_cut() {
    let body = "x".repeat(1000);
    let error = classify_status(StatusCode::INTERNAL_SERVER_ERROR, &body);
    assert!(error.message().len() < 320);
  }

  #[tokio::test]
  async fn test_missing_key_is_auth_error_without_request() {
    let client = ApiClient::new("http://127.0.0.1:9", ApiKey::default(), Duration::from_secs(1))
      .unwrap();
    let error = client.post_json::<_, serde_json::Value>("/embeddings", &json!({})).await.unwrap_err();
    assert!(matches!(error, ServiceError::Auth { .. }));
  }

  #[tokio::test]
  async fn test_success_body_is_decoded() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("POST", "/echo")
      .match_header("authorization", "Bearer sk-test")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"ok": true}"#)
      .create_async()
      .await;

    let client =
      ApiClient::new(&format!("{}/", server.url()), ApiKey::new("sk-test"), Duration::from_secs(5))
        .unwrap();
    let value: serde_json::Value = client.post_json("/echo", &json!({"ping": 1})).await.unwrap();

    assert_eq!(value["ok"], true);
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_undecodable_body_is_malformed() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server.mock("POST", "/echo").with_status(200).with_body("<html>").create_async().await;

    let client = ApiClient::new(&server.url(), ApiKey::new("sk-test"), Duration::from_secs(5)).unwrap();
    let error = client.post_json::<_, serde_json::Value>("/echo", &json!({})).await.unwrap_err();

    assert!(matches!(error, ServiceError::MalformedResponse { .. }));
  }
}
