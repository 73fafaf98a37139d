//! End-to-end behaviour of the gateway over both transports

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use owui_catalog::{AgentCatalog, CatalogCache, FilterPolicy};
use owui_core::UpstreamError;
use owui_mcp::transport::serve_connection;
use owui_mcp::{DispatcherConfig, McpDispatcher, Session, SseTransport, TaskExecutor};
use owui_upstream::mock::MockUpstream;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const CATALOG: &[&str] = &["gpt-4", "gpt-test", "claude-3"];

fn gateway(mock: &Arc<MockUpstream>) -> Arc<McpDispatcher> {
    let cache = CatalogCache::new(mock.clone(), Duration::from_secs(600));
    let catalog = AgentCatalog::new(cache, FilterPolicy::new(["gpt-*"], ["gpt-test"]));
    let executor = TaskExecutor::new(catalog.clone(), mock.clone());
    Arc::new(McpDispatcher::new(DispatcherConfig::default(), catalog, executor))
}

fn rpc(id: u64, method: &str, params: Value) -> String {
    json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}).to_string()
}

fn initialize(id: u64) -> String {
    rpc(
        id,
        "initialize",
        json!({"protocolVersion": "2024-11-05", "clientInfo": {"name": "it", "version": "0"}}),
    )
}

/// Feed lines through the stdio loop and collect the responses
async fn stdio_exchange(dispatcher: &McpDispatcher, lines: &[String]) -> Vec<Value> {
    let input = lines.join("\n") + "\n";
    let session = Session::new();
    let mut output = Vec::new();
    serve_connection(dispatcher, &session, input.as_bytes(), &mut output)
        .await
        .unwrap();
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

/// Minimal SSE client over an in-process router
struct SseClient {
    app: Router,
    stream: Body,
    endpoint: String,
}

impl SseClient {
    async fn connect(app: Router) -> Self {
        let resp = app
            .clone()
            .oneshot(Request::get("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let mut client = Self {
            app,
            stream: resp.into_body(),
            endpoint: String::new(),
        };
        let (event, data) = client.next_event().await;
        assert_eq!(event, "endpoint");
        client.endpoint = data;
        client
    }

    async fn next_event(&mut self) -> (String, String) {
        loop {
            let frame = self.stream.frame().await.unwrap().unwrap();
            let Ok(bytes) = frame.into_data() else { continue };
            let text = String::from_utf8(bytes.to_vec()).unwrap();
            let field = |name: &str| {
                text.lines()
                    .find_map(|line| line.strip_prefix(name)?.strip_prefix(':'))
                    .map(|v| v.trim().to_string())
            };
            if let (Some(event), Some(data)) = (field("event"), field("data")) {
                return (event, data);
            }
        }
    }

    async fn call(&mut self, body: String) -> Value {
        let resp = self
            .app
            .clone()
            .oneshot(
                Request::post(self.endpoint.as_str())
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let (event, data) = self.next_event().await;
        assert_eq!(event, "message");
        serde_json::from_str(&data).unwrap()
    }
}

#[tokio::test]
async fn listing_is_identical_over_stdio_and_sse() {
    let mock = Arc::new(MockUpstream::with_ids(CATALOG));
    let dispatcher = gateway(&mock);

    let stdio = stdio_exchange(&dispatcher, &[initialize(1), rpc(2, "list_agents", json!({}))]).await;
    let stdio_agents = stdio[1]["result"].clone();

    let mut sse = SseClient::connect(SseTransport::router(dispatcher.clone())).await;
    sse.call(initialize(1)).await;
    let sse_agents = sse.call(rpc(2, "list_agents", json!({}))).await["result"].clone();

    assert_eq!(stdio_agents, sse_agents);
    let ids: Vec<&str> = stdio_agents["agents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["gpt-4"]);
}

#[tokio::test]
async fn invoke_returns_agent_text() {
    let mock = Arc::new(MockUpstream::with_ids(CATALOG));
    mock.set_completion(Ok("hello".into()));
    let dispatcher = gateway(&mock);

    let responses = stdio_exchange(
        &dispatcher,
        &[initialize(1), rpc(2, "invoke_agent", json!({"id": "gpt-4", "prompt": "hi"}))],
    )
    .await;

    assert_eq!(responses[1]["result"], json!({"text": "hello"}));
    let call = mock.last_completion().unwrap();
    assert_eq!((call.model_id.as_str(), call.prompt.as_str()), ("gpt-4", "hi"));
}

#[tokio::test]
async fn upstream_timeout_is_structured_and_connection_survives() {
    let mock = Arc::new(MockUpstream::with_ids(CATALOG));
    mock.push_completion(Err(UpstreamError::timeout("completion exceeded 60s")));
    mock.set_completion(Ok("recovered".into()));
    let dispatcher = gateway(&mock);

    let mut sse = SseClient::connect(SseTransport::router(dispatcher)).await;
    sse.call(initialize(1)).await;

    let failed = sse
        .call(rpc(2, "invoke_agent", json!({"id": "gpt-4", "prompt": "hi"})))
        .await;
    assert_eq!(failed["id"], 2);
    assert_eq!(failed["error"]["code"], -32010);
    assert_eq!(failed["error"]["data"]["kind"], "timeout");

    let ok = sse
        .call(rpc(3, "invoke_agent", json!({"id": "gpt-4", "prompt": "again"})))
        .await;
    assert_eq!(ok["result"]["text"], "recovered");
}

#[tokio::test]
async fn blacklisted_agent_never_reaches_upstream() {
    let mock = Arc::new(MockUpstream::with_ids(CATALOG));
    let dispatcher = gateway(&mock);

    let responses = stdio_exchange(
        &dispatcher,
        &[
            initialize(1),
            rpc(2, "invoke_agent", json!({"id": "gpt-test", "prompt": "hi"})),
            rpc(3, "describe_agent", json!({"id": "gpt-test"})),
        ],
    )
    .await;

    assert_eq!(responses[1]["error"]["data"]["kind"], "forbidden");
    // Filtered-out ids are absent from the catalog for describe
    assert_eq!(responses[2]["error"]["code"], -32004);
    assert_eq!(responses[2]["error"]["data"]["kind"], "not_found");
    assert_eq!(mock.list_calls(), 0);
    assert_eq!(mock.complete_calls(), 0);
}

#[tokio::test]
async fn session_lifecycle_is_enforced() {
    let mock = Arc::new(MockUpstream::with_ids(CATALOG));
    let dispatcher = gateway(&mock);

    let responses = stdio_exchange(
        &dispatcher,
        &[
            rpc(1, "list_agents", json!({})),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string(),
            initialize(2),
            rpc(3, "shutdown", json!({})),
            rpc(4, "list_agents", json!({})),
        ],
    )
    .await;

    // The notification gets no response line
    assert_eq!(responses.len(), 4);
    assert_eq!(responses[0]["error"]["data"]["kind"], "not_initialized");
    assert!(responses[1]["result"]["serverInfo"].is_object());
    assert_eq!(responses[2]["result"], json!({}));
    assert_eq!(responses[3]["error"]["data"]["kind"], "closed");
}

#[tokio::test]
async fn sessions_are_independent() {
    let mock = Arc::new(MockUpstream::with_ids(CATALOG));
    let app = SseTransport::router(gateway(&mock));

    let mut first = SseClient::connect(app.clone()).await;
    let mut second = SseClient::connect(app.clone()).await;
    assert_ne!(first.endpoint, second.endpoint);

    first.call(initialize(1)).await;
    let rejected = second.call(rpc(1, "list_agents", json!({}))).await;
    assert_eq!(rejected["error"]["code"], -32002);

    let health = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = health.into_body().collect().await.unwrap().to_bytes();
    let health: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["sessions"], 2);
}
