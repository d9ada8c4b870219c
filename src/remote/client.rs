// ABOUTME: HTTP client for communicating with the VPN Wizard API
// ABOUTME: Normalizes transport failures and non-2xx responses into RequestError

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;

use super::gateway::Gateway;
use crate::error::{RequestError, GENERIC_FAILURE};

pub struct ApiClient {
    client: Client,
    api_base_url: String,
}

impl ApiClient {
    pub fn new(api_base_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.api_base_url
    }
}

#[async_trait]
impl Gateway for ApiClient {
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, RequestError> {
        let url = format!("{}{}", self.api_base_url, path);
        tracing::debug!(method = method.as_str(), %url, "Sending API request");

        let mut request = self.client.request(method, &url);
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(%url, error = %e, "API request did not complete");
            RequestError::transport(e.status().map(|s| s.as_u16()), e.to_string())
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RequestError::transport(Some(status.as_u16()), e.to_string()))?;
        let payload = parse_body(&text);

        if !status.is_success() {
            let message = failure_message(payload.as_ref());
            tracing::warn!(%url, status = status.as_u16(), %message, "API request failed");
            return Err(RequestError::transport(Some(status.as_u16()), message));
        }

        payload.ok_or_else(|| RequestError::logical(format!("Response from {} is not JSON", path)))
    }
}

fn parse_body(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return Some(Value::Null);
    }
    serde_json::from_str(text).ok()
}

/// Uses the body's `detail` field when present, as FastAPI-style services
/// report errors there.
fn failure_message(payload: Option<&Value>) -> String {
    match payload.and_then(|p| p.get("detail")) {
        Some(Value::String(detail)) if !detail.is_empty() => detail.clone(),
        Some(Value::Null) | None => GENERIC_FAILURE.to_string(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_creation() {
        let client = ApiClient::new(
            "https://api.example.com/".to_string(),
            Duration::from_secs(30),
        );
        assert!(client.is_ok());
        assert_eq!(client.unwrap().base_url(), "https://api.example.com");
    }

    #[test]
    fn test_failure_message_prefers_detail() {
        let body = json!({"detail": "Job not found"});
        assert_eq!(failure_message(Some(&body)), "Job not found");
    }

    #[test]
    fn test_failure_message_falls_back() {
        assert_eq!(failure_message(None), GENERIC_FAILURE);
        assert_eq!(failure_message(Some(&json!({"other": 1}))), GENERIC_FAILURE);
    }

    #[test]
    fn test_failure_message_stringifies_structured_detail() {
        let body = json!({"detail": [{"loc": ["body", "ssh"], "msg": "field required"}]});
        let message = failure_message(Some(&body));
        assert!(message.contains("field required"));
    }

    #[test]
    fn test_parse_body_handles_empty_and_garbage() {
        assert_eq!(parse_body("  "), Some(Value::Null));
        assert_eq!(parse_body("<html>"), None);
        assert_eq!(parse_body("{\"ok\":true}"), Some(json!({"ok": true})));
    }
}
