//! Protocol Dispatcher
//!
//! Transport-neutral request handling. One [`Session`] per connection carries
//! the `Uninitialized → Ready → Closed` state; the dispatcher itself is shared.

use owui_catalog::AgentCatalog;
use owui_core::{ErrorKind, GatewayError, ProtocolError, TaskRequest, TaskResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::executor::TaskExecutor;
use crate::protocol::{JsonRpcError, McpRequest, McpResponse};
use crate::session::{Session, SessionState};
use crate::tools::{self, DESCRIBE_AGENT, INVOKE_AGENT, INVOKE_AGENT_ALIAS, LIST_AGENTS};
use crate::{PROTOCOL_VERSION, SERVER_NAME, SERVER_VERSION, SUPPORTED_PROTOCOL_VERSIONS};

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Reported in `serverInfo.name`
    pub server_name: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            server_name: SERVER_NAME.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct AgentParams {
    #[serde(alias = "agent_id")]
    id: String,
}

#[derive(Deserialize)]
struct InvokeParams {
    #[serde(alias = "agent_id")]
    id: String,
    prompt: String,
    #[serde(default)]
    parameters: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

pub struct McpDispatcher {
    config: DispatcherConfig,
    catalog: AgentCatalog,
    executor: TaskExecutor,
}

impl McpDispatcher {
    pub fn new(config: DispatcherConfig, catalog: AgentCatalog, executor: TaskExecutor) -> Self {
        Self {
            config,
            catalog,
            executor,
        }
    }

    /// Handle one message. Notifications never produce a response.
    pub async fn handle_request(&self, session: &Session, request: McpRequest) -> Option<McpResponse> {
        debug!(session = %session.id(), method = %request.method, "Handling MCP request");

        let notification = request.is_notification();
        let id = request.id;
        let outcome = self.dispatch(session, &request.method, request.params).await;

        if notification {
            if let Err(err) = outcome {
                debug!(method = %request.method, "Dropped error for notification: {}", err.message);
            }
            return None;
        }

        Some(match outcome {
            Ok(result) => McpResponse::success(id, result),
            Err(error) => McpResponse::error(id, error),
        })
    }

    /// Catalog cache snapshot for health reporting
    pub async fn health(&self) -> Value {
        let snapshot = self.catalog.cache().snapshot().await;
        let stale = snapshot.age.map_or(true, |age| age > snapshot.ttl);
        json!({
            "agents": snapshot.agent_count,
            "age_seconds": snapshot.age.map(|age| age.as_secs()),
            "ttl_seconds": snapshot.ttl.as_secs(),
            "stale": stale,
            "refreshing": snapshot.refreshing,
            "stats": {
                "hits": snapshot.stats.hits,
                "misses": snapshot.stats.misses,
                "shared": snapshot.stats.shared,
                "refreshes": snapshot.stats.refreshes,
                "failed_refreshes": snapshot.stats.failed_refreshes,
                "stale_served": snapshot.stats.stale_served
            }
        })
    }

    async fn dispatch(
        &self,
        session: &Session,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, JsonRpcError> {
        match session.state() {
            SessionState::Closed => return Err(ProtocolError::closed(method).into()),
            SessionState::Uninitialized if !matches!(method, "initialize" | "ping") => {
                return Err(ProtocolError::not_initialized(method).into());
            }
            _ => {}
        }

        match method {
            "initialize" => Ok(self.handle_initialize(session, params)),
            "ping" => Ok(json!({})),
            "notifications/initialized" | "initialized" => Ok(json!({})),
            "shutdown" => {
                session.close();
                info!(session = %session.id(), "Session closed by client");
                Ok(json!({}))
            }
            LIST_AGENTS => self.list_agents().await,
            DESCRIBE_AGENT => self.describe_agent(params).await,
            INVOKE_AGENT => {
                let text = self.invoke_agent(params).await?;
                Ok(json!({ "text": text }))
            }
            "tools/list" => Ok(tools::tool_definitions()),
            "tools/call" => self.handle_tools_call(params).await,
            other => Err(ProtocolError::unknown_method(other).into()),
        }
    }

    fn handle_initialize(&self, session: &Session, params: Option<Value>) -> Value {
        let params = params.unwrap_or(Value::Null);

        let version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .filter(|v| SUPPORTED_PROTOCOL_VERSIONS.contains(v))
            .unwrap_or(PROTOCOL_VERSION);

        let client_info = params.get("clientInfo");
        let client_name = client_info
            .and_then(|ci| ci.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let client_version = client_info
            .and_then(|ci| ci.get("version"))
            .and_then(Value::as_str)
            .unwrap_or("?");

        session.mark_ready();
        info!(
            session = %session.id(),
            client = %client_name,
            version = %client_version,
            protocol = %version,
            "Client connected"
        );

        json!({
            "protocolVersion": version,
            "capabilities": {
                "tools": { "listChanged": false }
            },
            "serverInfo": {
                "name": self.config.server_name,
                "version": SERVER_VERSION
            }
        })
    }

    async fn list_agents(&self) -> Result<Value, JsonRpcError> {
        let agents = self.catalog.list().await.map_err(GatewayError::from)?;
        Ok(json!({ "agents": agents }))
    }

    async fn describe_agent(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: AgentParams = parse_params(params)?;
        require_id(&params.id)?;

        let agent = self.catalog.describe(&params.id).await?;
        Ok(json!({
            "id": agent.id,
            "display_name": agent.display_name,
            "description": agent.description
        }))
    }

    async fn invoke_agent(&self, params: Option<Value>) -> Result<String, JsonRpcError> {
        let params: InvokeParams = parse_params(params)?;
        require_id(&params.id)?;

        let request = TaskRequest::new(params.id, params.prompt)
            .with_parameters(params.parameters.unwrap_or_default());

        match self.executor.run(request).await {
            TaskResult::Success { text } => Ok(text),
            TaskResult::Failure { kind, message } => Err(JsonRpcError::from_kind(kind, message)),
        }
    }

    async fn handle_tools_call(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let call: ToolCallParams = parse_params(params)?;
        let arguments = call.arguments.unwrap_or_else(|| json!({}));

        let outcome = match call.name.as_str() {
            LIST_AGENTS => self.list_agents().await.map(pretty),
            DESCRIBE_AGENT => self.describe_agent(Some(arguments)).await.map(pretty),
            INVOKE_AGENT | INVOKE_AGENT_ALIAS => self.invoke_agent(Some(arguments)).await,
            other => {
                return Err(ProtocolError::invalid_params(format!("Unknown tool: {}", other)).into());
            }
        };

        // Tool failures are results, not protocol errors
        Ok(match outcome {
            Ok(text) => tools::text_content(text),
            Err(err) => tools::error_content(
                err.kind().unwrap_or(ErrorKind::ServerError.as_str()),
                err.message.clone(),
            ),
        })
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, JsonRpcError> {
    let params = params.unwrap_or_else(|| json!({}));
    serde_json::from_value(params)
        .map_err(|e| ProtocolError::invalid_params(format!("Invalid params: {}", e)).into())
}

fn require_id(id: &str) -> Result<(), JsonRpcError> {
    if id.trim().is_empty() {
        return Err(ProtocolError::invalid_params("agent id must not be empty").into());
    }
    Ok(())
}

fn pretty(value: Value) -> String {
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use owui_catalog::{CatalogCache, FilterPolicy};
    use owui_core::UpstreamError;
    use owui_upstream::mock::MockUpstream;
    use std::sync::Arc;
    use std::time::Duration;

    fn dispatcher(mock: &Arc<MockUpstream>, policy: FilterPolicy) -> McpDispatcher {
        let cache = CatalogCache::new(mock.clone(), Duration::from_secs(60));
        let catalog = AgentCatalog::new(cache, policy);
        let executor = TaskExecutor::new(catalog.clone(), mock.clone());
        McpDispatcher::new(DispatcherConfig::default(), catalog, executor)
    }

    async fn call(d: &McpDispatcher, s: &Session, method: &str, params: Value) -> McpResponse {
        let request = McpRequest::new(method).with_id(1).with_params(params);
        d.handle_request(s, request).await.unwrap()
    }

    async fn ready_session(d: &McpDispatcher) -> Session {
        let session = Session::new();
        call(d, &session, "initialize", json!({})).await;
        session
    }

    #[tokio::test]
    async fn test_initialize_echoes_supported_version() {
        let d = dispatcher(&Arc::new(MockUpstream::with_ids(&[])), FilterPolicy::allow_all());
        let session = Session::new();

        let resp = call(&d, &session, "initialize", json!({"protocolVersion": "2025-03-26"})).await;
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], "2025-03-26");
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert!(result["capabilities"]["tools"].is_object());
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_initialize_falls_back_to_default_version() {
        let d = dispatcher(&Arc::new(MockUpstream::with_ids(&[])), FilterPolicy::allow_all());
        let resp = call(&d, &Session::new(), "initialize", json!({"protocolVersion": "1999-01-01"})).await;
        assert_eq!(resp.result.unwrap()["protocolVersion"], PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn test_methods_before_initialize_rejected() {
        let mock = Arc::new(MockUpstream::with_ids(&["gpt-4"]));
        let d = dispatcher(&mock, FilterPolicy::allow_all());
        let session = Session::new();

        let resp = call(&d, &session, "list_agents", json!({})).await;
        let error = resp.error.unwrap();
        assert_eq!(error.code, -32002);
        assert_eq!(error.kind(), Some("not_initialized"));
        assert_eq!(mock.list_calls(), 0);

        let resp = call(&d, &session, "ping", json!({})).await;
        assert!(resp.is_success());
    }

    #[tokio::test]
    async fn test_closed_session_rejects_everything() {
        let d = dispatcher(&Arc::new(MockUpstream::with_ids(&["gpt-4"])), FilterPolicy::allow_all());
        let session = ready_session(&d).await;

        assert!(call(&d, &session, "shutdown", json!({})).await.is_success());
        for method in ["ping", "initialize", "list_agents"] {
            let error = call(&d, &session, method, json!({})).await.error.unwrap();
            assert_eq!(error.code, -32003, "{} after shutdown", method);
        }
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let d = dispatcher(&Arc::new(MockUpstream::with_ids(&[])), FilterPolicy::allow_all());
        let session = ready_session(&d).await;

        let note = McpRequest::new("notifications/initialized");
        assert!(d.handle_request(&session, note).await.is_none());

        let unknown = McpRequest::new("notifications/cancelled");
        assert!(d.handle_request(&session, unknown).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_method_and_bad_params() {
        let d = dispatcher(&Arc::new(MockUpstream::with_ids(&["gpt-4"])), FilterPolicy::allow_all());
        let session = ready_session(&d).await;

        let error = call(&d, &session, "agents/teleport", json!({})).await.error.unwrap();
        assert_eq!(error.code, -32601);

        let error = call(&d, &session, "describe_agent", json!({"id": 42})).await.error.unwrap();
        assert_eq!(error.code, -32602);

        let error = call(&d, &session, "invoke_agent", json!({"id": "gpt-4"})).await.error.unwrap();
        assert_eq!(error.kind(), Some("invalid_params"));
    }

    #[tokio::test]
    async fn test_describe_agent_accepts_agent_id_alias() {
        let mock = Arc::new(MockUpstream::new(vec![owui_core::Agent::new("gpt-4", "GPT 4", "General")]));
        let d = dispatcher(&mock, FilterPolicy::allow_all());
        let session = ready_session(&d).await;

        let resp = call(&d, &session, "describe_agent", json!({"agent_id": "gpt-4"})).await;
        assert_eq!(
            resp.result.unwrap(),
            json!({"id": "gpt-4", "display_name": "GPT 4", "description": "General"})
        );

        let error = call(&d, &session, "describe_agent", json!({"id": "ghost"})).await.error.unwrap();
        assert_eq!(error.code, -32004);
    }

    #[tokio::test]
    async fn test_tools_call_wraps_results() {
        let mock = Arc::new(MockUpstream::with_ids(&["gpt-4"]));
        mock.push_completion(Ok("hello".into()));
        mock.push_completion(Err(UpstreamError::timeout("deadline exceeded")));
        let d = dispatcher(&mock, FilterPolicy::allow_all());
        let session = ready_session(&d).await;

        let resp = call(
            &d,
            &session,
            "tools/call",
            json!({"name": "openwebui_chat", "arguments": {"agent_id": "gpt-4", "prompt": "hi"}}),
        )
        .await;
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], false);
        assert_eq!(result["content"][0]["text"], "hello");

        let resp = call(
            &d,
            &session,
            "tools/call",
            json!({"name": "invoke_agent", "arguments": {"id": "gpt-4", "prompt": "hi"}}),
        )
        .await;
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], true);
        assert_eq!(result["_meta"]["kind"], "timeout");

        let error = call(&d, &session, "tools/call", json!({"name": "rm_rf"})).await.error.unwrap();
        assert_eq!(error.code, -32602);
    }

    #[tokio::test]
    async fn test_tools_list() {
        let d = dispatcher(&Arc::new(MockUpstream::with_ids(&[])), FilterPolicy::allow_all());
        let session = ready_session(&d).await;
        let result = call(&d, &session, "tools/list", json!({})).await.result.unwrap();
        assert_eq!(result["tools"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_health_reports_cache() {
        let mock = Arc::new(MockUpstream::with_ids(&["gpt-4", "llama3"]));
        let d = dispatcher(&mock, FilterPolicy::allow_all());

        assert_eq!(d.health().await["stale"], true);

        let session = ready_session(&d).await;
        call(&d, &session, "list_agents", json!({})).await;

        let health = d.health().await;
        assert_eq!(health["agents"], 2);
        assert_eq!(health["stale"], false);
        assert_eq!(health["stats"]["refreshes"], 1);
    }
}
