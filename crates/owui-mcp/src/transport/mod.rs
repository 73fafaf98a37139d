//! Transport Layer
//!
//! Provides two transport implementations:
//! - Stdio (line-delimited JSON-RPC on stdin/stdout)
//! - SSE (event stream for responses, POST for requests)
//!
//! Both only translate framing; every request goes through the same
//! [`McpHandler`].

mod sse;
mod stdio;

pub use sse::SseTransport;
pub use stdio::{serve_connection, StdioTransport};

use anyhow::Result;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{McpDispatcher, McpRequest, McpResponse, Session};

/// Generic MCP server trait for transport layer
#[async_trait::async_trait]
pub trait McpHandler: Send + Sync {
    async fn handle_request(&self, session: &Session, request: McpRequest) -> Option<McpResponse>;

    /// Extra fields for the health endpoint
    async fn health(&self) -> Value {
        json!({})
    }
}

/// Transport trait - implement for new transport types
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Serve requests using this transport
    async fn serve<H: McpHandler + 'static>(self, handler: Arc<H>) -> Result<()>;
}

#[async_trait::async_trait]
impl McpHandler for McpDispatcher {
    async fn handle_request(&self, session: &Session, request: McpRequest) -> Option<McpResponse> {
        McpDispatcher::handle_request(self, session, request).await
    }

    async fn health(&self) -> Value {
        McpDispatcher::health(self).await
    }
}
