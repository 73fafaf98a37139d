//! SSE Transport
//!
//! `GET /sse` opens a session and streams its responses. The first event is
//! `endpoint`, naming the URL the client POSTs requests to. Each session has
//! one worker draining its inbound queue, so responses keep request order.
//! When the event stream is dropped the worker stops and the session closes.

use super::{McpHandler, Transport};
use crate::protocol::decode_request;
use crate::{McpRequest, McpResponse, Session, SERVER_NAME, SERVER_VERSION};
use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);
const SESSION_QUEUE: usize = 64;

/// What the session worker receives
enum Inbound {
    Request(McpRequest),
    /// Pre-built reply for a message that could not be decoded
    Reply(McpResponse),
}

/// Shared state for HTTP handlers
struct SseState<H> {
    handler: Arc<H>,
    sessions: RwLock<HashMap<String, mpsc::Sender<Inbound>>>,
}

impl<H> SseState<H> {
    async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// SSE transport
pub struct SseTransport {
    bind_addr: String,
}

impl SseTransport {
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
        }
    }

    /// Router with all SSE routes, usable without binding a socket
    pub fn router<H: McpHandler + 'static>(handler: Arc<H>) -> Router {
        let state = Arc::new(SseState {
            handler,
            sessions: RwLock::new(HashMap::new()),
        });

        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler::<H>))
            .route("/sse", get(sse_handler::<H>))
            .route("/messages", post(message_handler::<H>))
            .route("/messages/", post(message_handler::<H>))
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

#[async_trait::async_trait]
impl Transport for SseTransport {
    async fn serve<H: McpHandler + 'static>(self, handler: Arc<H>) -> Result<()> {
        info!(addr = %self.bind_addr, "Starting SSE transport");

        let app = Self::router(handler);

        let listener = tokio::net::TcpListener::bind(&self.bind_addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.bind_addr))?;
        info!(addr = %self.bind_addr, "SSE transport listening");

        axum::serve(listener, app).await?;
        Ok(())
    }
}

// === Handlers ===

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ready",
        "server": SERVER_NAME,
        "transport": "SSE"
    }))
}

async fn health_handler<H: McpHandler>(State(state): State<Arc<SseState<H>>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "server": SERVER_NAME,
        "version": SERVER_VERSION,
        "sessions": state.session_count().await,
        "catalog": state.handler.health().await
    }))
}

async fn sse_handler<H: McpHandler + 'static>(
    State(state): State<Arc<SseState<H>>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session = Arc::new(Session::new());
    let (inbound_tx, inbound_rx) = mpsc::channel(SESSION_QUEUE);
    let (outbound_tx, outbound_rx) = mpsc::channel(SESSION_QUEUE);

    state
        .sessions
        .write()
        .await
        .insert(session.id().to_string(), inbound_tx);
    info!(session_id = %session.id(), "SSE client connected");

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("/messages/?session_id={}", session.id()));

    tokio::spawn(run_session(state, session, inbound_rx, outbound_tx));

    let messages = ReceiverStream::new(outbound_rx).filter_map(|response: McpResponse| {
        match serde_json::to_string(&response) {
            Ok(data) => Some(Ok(Event::default().event("message").data(data))),
            Err(e) => {
                error!(error = %e, "Failed to encode response");
                None
            }
        }
    });

    let stream = tokio_stream::once(Ok(endpoint)).chain(messages);
    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

/// Drain one session's queue until the client goes away
async fn run_session<H: McpHandler + 'static>(
    state: Arc<SseState<H>>,
    session: Arc<Session>,
    mut inbound: mpsc::Receiver<Inbound>,
    outbound: mpsc::Sender<McpResponse>,
) {
    loop {
        let message = tokio::select! {
            _ = outbound.closed() => break,
            message = inbound.recv() => message,
        };
        let Some(message) = message else {
            break;
        };

        let response = match message {
            Inbound::Request(request) => tokio::select! {
                // Client gone: abandon the in-flight request
                _ = outbound.closed() => break,
                response = state.handler.handle_request(&session, request) => response,
            },
            Inbound::Reply(reply) => Some(reply),
        };

        if let Some(response) = response {
            if outbound.send(response).await.is_err() {
                break;
            }
        }
    }

    session.close();
    state.sessions.write().await.remove(session.id());
    info!(session_id = %session.id(), "SSE session closed");
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    session_id: Option<String>,
}

async fn message_handler<H: McpHandler>(
    State(state): State<Arc<SseState<H>>>,
    Query(query): Query<MessageQuery>,
    body: String,
) -> Response {
    let Some(session_id) = query.session_id.filter(|id| !id.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Missing session_id").into_response();
    };

    let sender = state.sessions.read().await.get(&session_id).cloned();
    let Some(sender) = sender else {
        return (StatusCode::NOT_FOUND, "Unknown session").into_response();
    };

    let (inbound, status) = match decode_request(&body) {
        Ok(request) => {
            debug!(session_id = %session_id, method = %request.method, "SSE request queued");
            (Inbound::Request(request), StatusCode::ACCEPTED)
        }
        Err(reply) => {
            warn!(session_id = %session_id, "Malformed message on SSE session");
            (Inbound::Reply(reply), StatusCode::BAD_REQUEST)
        }
    };

    if sender.send(inbound).await.is_err() {
        return (StatusCode::NOT_FOUND, "Session closed").into_response();
    }

    let text = if status == StatusCode::ACCEPTED {
        "Accepted"
    } else {
        "Malformed JSON-RPC message"
    };
    (status, text).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    struct Echo;

    #[async_trait::async_trait]
    impl McpHandler for Echo {
        async fn handle_request(&self, _session: &Session, request: McpRequest) -> Option<McpResponse> {
            Some(McpResponse::success(request.id, json!({ "method": request.method })))
        }
    }

    fn router() -> Router {
        SseTransport::router(Arc::new(Echo))
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn next_event(body: &mut Body) -> String {
        loop {
            let frame = body.frame().await.unwrap().unwrap();
            if let Ok(data) = frame.into_data() {
                let text = String::from_utf8(data.to_vec()).unwrap();
                if text.lines().any(|line| line.starts_with("event:")) {
                    return text;
                }
            }
        }
    }

    fn field<'a>(event: &'a str, name: &str) -> &'a str {
        event
            .lines()
            .find_map(|line| line.strip_prefix(name)?.strip_prefix(':'))
            .map(str::trim)
            .unwrap()
    }

    fn event_data(event: &str) -> &str {
        field(event, "data")
    }

    #[tokio::test]
    async fn test_root_reports_ready() {
        let resp = router()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["status"], "ready");
        assert_eq!(value["transport"], "SSE");
    }

    #[tokio::test]
    async fn test_post_without_session_is_bad_request() {
        let resp = router().oneshot(post("/messages/", "{}")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_post_to_unknown_session_is_not_found() {
        let resp = router()
            .oneshot(post("/messages/?session_id=nope", r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_round_trip_over_event_stream() {
        let app = router();

        let resp = app
            .clone()
            .oneshot(Request::get("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let mut stream = resp.into_body();

        let endpoint = next_event(&mut stream).await;
        assert_eq!(field(&endpoint, "event"), "endpoint");
        let path = event_data(&endpoint).to_string();
        assert!(path.starts_with("/messages/?session_id="));

        let resp = app
            .clone()
            .oneshot(post(&path, r#"{"jsonrpc":"2.0","id":9,"method":"ping"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let message = next_event(&mut stream).await;
        assert_eq!(field(&message, "event"), "message");
        let value: Value = serde_json::from_str(event_data(&message)).unwrap();
        assert_eq!(value["id"], 9);
        assert_eq!(value["result"]["method"], "ping");

        // Malformed body: 400 plus a parse error on the stream
        let resp = app.clone().oneshot(post(&path, "{nope")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let message = next_event(&mut stream).await;
        let value: Value = serde_json::from_str(event_data(&message)).unwrap();
        assert_eq!(value["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn test_dropping_stream_unregisters_session() {
        let app = router();

        let resp = app
            .clone()
            .oneshot(Request::get("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let mut stream = resp.into_body();
        let endpoint = next_event(&mut stream).await;
        let path = event_data(&endpoint).to_string();
        drop(stream);

        // Worker notices the closed stream and removes the session
        let mut status = StatusCode::ACCEPTED;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let resp = app
                .clone()
                .oneshot(post(&path, r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#))
                .await
                .unwrap();
            status = resp.status();
            if status == StatusCode::NOT_FOUND {
                break;
            }
        }
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
