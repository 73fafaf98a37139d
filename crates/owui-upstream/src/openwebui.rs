//! OpenWebUI API Client
//!
//! ## API Endpoints
//!
//! | Endpoint | URL | Purpose |
//! |----------|-----|--------|
//! | Models | `{base}/api/models` | Model catalog (bare array or `{"data": [...]}`) |
//! | Chat | `{base}/api/chat/completions` | OpenAI-style chat completion |
//!
//! Workspace models are the records carrying an `info` block; plain
//! connection models are skipped unless `workspace_only` is disabled.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use owui_core::{Agent, GatewayConfig, UpstreamError, DEFAULT_AGENT_DESCRIPTION};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::client::UpstreamClient;

// =============================================================================
// API ENDPOINT CONFIGURATION
// =============================================================================

pub mod endpoints {
    /// Full URL: {base}/api/models
    pub const MODELS: &str = "/api/models";

    /// Full URL: {base}/api/chat/completions
    pub const CHAT_COMPLETIONS: &str = "/api/chat/completions";
}

/// Keys the gateway owns in the completion payload
const RESERVED_PARAMETERS: &[&str] = &["model", "messages", "stream"];

/// Upper bound on upstream error text carried into messages
const MAX_ERROR_DETAIL: usize = 512;

// =============================================================================
// DATA STRUCTURES
// =============================================================================

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Connection settings for [`OpenWebUiClient`]
#[derive(Debug, Clone)]
pub struct OpenWebUiConfig {
    pub base_url: String,
    pub api_key: String,
    pub models_timeout: Duration,
    pub completion_timeout: Duration,
    pub workspace_only: bool,
}

impl OpenWebUiConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            models_timeout: Duration::from_secs(30),
            completion_timeout: Duration::from_secs(60),
            workspace_only: true,
        }
    }
}

impl From<&GatewayConfig> for OpenWebUiConfig {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            base_url: config.openwebui_url.clone(),
            api_key: config.openwebui_api_key.clone(),
            models_timeout: config.models_timeout(),
            completion_timeout: config.completion_timeout(),
            workspace_only: config.workspace_only,
        }
    }
}

// =============================================================================
// CLIENT IMPLEMENTATION
// =============================================================================

/// OpenWebUI client
pub struct OpenWebUiClient {
    client: Client,
    base_url: String,
    models_timeout: Duration,
    completion_timeout: Duration,
    workspace_only: bool,
}

impl OpenWebUiClient {
    pub fn new(config: OpenWebUiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if !config.api_key.is_empty() {
            let mut bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|_| anyhow!("Invalid characters in OpenWebUI API key"))?;
            bearer.set_sensitive(true);
            headers.insert(AUTHORIZATION, bearer);
        }

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            models_timeout: config.models_timeout,
            completion_timeout: config.completion_timeout,
            workspace_only: config.workspace_only,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }
}

#[async_trait]
impl UpstreamClient for OpenWebUiClient {
    async fn list_models(&self) -> Result<Vec<Agent>, UpstreamError> {
        let url = self.url(endpoints::MODELS);
        debug!("Fetching models from {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(self.models_timeout)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;
        let body: Value = response.json().await.map_err(transport_error)?;

        let agents = parse_models(body, self.workspace_only);
        info!(count = agents.len(), "Fetched models from OpenWebUI");
        Ok(agents)
    }

    async fn complete(
        &self,
        model_id: &str,
        prompt: &str,
        parameters: &Map<String, Value>,
    ) -> Result<String, UpstreamError> {
        let url = self.url(endpoints::CHAT_COMPLETIONS);
        let payload = completion_payload(model_id, prompt, parameters);
        debug!(model = %model_id, "Sending chat completion to {}", url);

        let response = self
            .client
            .post(&url)
            .timeout(self.completion_timeout)
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;
        let data: Value = response.json().await.map_err(transport_error)?;

        let completion: ChatCompletionResponse = serde_json::from_value(data.clone())
            .map_err(|e| {
                error!(model = %model_id, "Unexpected completion format: {}", e);
                UpstreamError::server_error(format!("Unexpected response format from OpenWebUI API: {}", e))
            })?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .ok_or_else(|| {
                error!(model = %model_id, "Completion carried no message content");
                UpstreamError::server_error(format!(
                    "Unexpected response format from OpenWebUI API: {}",
                    truncate(&data.to_string())
                ))
            })
    }
}

// =============================================================================
// MAPPING HELPERS
// =============================================================================

/// Map a model listing body onto agents.
///
/// Accepts `{"data": [...]}` or a bare array; anything else is an empty catalog.
fn parse_models(body: Value, workspace_only: bool) -> Vec<Agent> {
    let records = match body {
        Value::Array(records) => records,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(records)) => records,
            _ => vec![],
        },
        _ => vec![],
    };

    records
        .iter()
        .filter(|record| !workspace_only || record.get("info").map_or(false, Value::is_object))
        .filter_map(model_to_agent)
        .collect()
}

fn model_to_agent(record: &Value) -> Option<Agent> {
    let id = record.get("id").and_then(Value::as_str).filter(|id| !id.is_empty())?;
    let display_name = record
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .unwrap_or(id);
    let description = record
        .pointer("/info/meta/description")
        .and_then(Value::as_str)
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_AGENT_DESCRIPTION);

    Some(Agent::new(id, display_name, description))
}

fn completion_payload(model_id: &str, prompt: &str, parameters: &Map<String, Value>) -> Value {
    let mut payload: Map<String, Value> = parameters
        .iter()
        .filter(|(key, _)| !RESERVED_PARAMETERS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    payload.insert("model".into(), json!(model_id));
    payload.insert("messages".into(), json!([{ "role": "user", "content": prompt }]));
    payload.insert("stream".into(), json!(false));
    Value::Object(payload)
}

async fn check_status(response: Response) -> Result<Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = body_or_empty(status, response.text().await);
    error!(status = %status, "OpenWebUI API error: {}", truncate(&body));
    Err(status_error(status, &body))
}

/// Error bodies are best-effort detail; a failed read leaves them empty
fn body_or_empty<E: std::fmt::Display>(status: StatusCode, body: Result<String, E>) -> String {
    body.unwrap_or_else(|e| {
        debug!(status = %status, error = %e, "Failed to read error response body");
        String::new()
    })
}

fn status_error(status: StatusCode, body: &str) -> UpstreamError {
    let message = format!("Error from OpenWebUI API ({}): {}", status.as_u16(), error_detail(body));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => UpstreamError::auth_failed(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => UpstreamError::timeout(message),
        s if s.is_client_error() => UpstreamError::bad_request(message),
        _ => UpstreamError::server_error(message),
    }
}

fn transport_error(err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::timeout(format!("Request to OpenWebUI timed out: {}", err))
    } else if err.is_decode() {
        UpstreamError::server_error(format!("Undecodable response from OpenWebUI: {}", err))
    } else {
        UpstreamError::network(format!("Request error talking to OpenWebUI: {}", err))
    }
}

/// Prefer a JSON `detail` / `error.message` / `message` field over the raw body
fn error_detail(body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let detail = parsed.as_ref().and_then(|v| {
        v.get("detail")
            .or_else(|| v.pointer("/error/message"))
            .or_else(|| v.get("message"))
            .map(|d| match d {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
    });
    truncate(detail.as_deref().unwrap_or(body))
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_ERROR_DETAIL {
        return text.to_string();
    }
    let head: String = text.chars().take(MAX_ERROR_DETAIL).collect();
    format!("{}...", head)
}
