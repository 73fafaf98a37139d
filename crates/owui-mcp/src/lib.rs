//! owui-mcp: OpenWebUI Agents over MCP
//!
//! Exposes the filtered OpenWebUI model catalog as invocable agents.
//!
//! Architecture:
//! stdin/stdout or SSE+POST → McpRequest → McpDispatcher → AgentCatalog / TaskExecutor
//!
//! Methods:
//! - initialize → handshake, session becomes ready
//! - list_agents / describe_agent / invoke_agent → agent operations
//! - tools/list, tools/call → same operations as MCP tools
//! - ping, shutdown

pub mod dispatcher;
pub mod executor;
pub mod protocol;
pub mod session;
pub mod tools;
pub mod transport;

pub use dispatcher::{DispatcherConfig, McpDispatcher};
pub use executor::TaskExecutor;
pub use protocol::{JsonRpcError, McpRequest, McpResponse};
pub use session::{Session, SessionState};
pub use transport::{McpHandler, SseTransport, StdioTransport, Transport};

/// Default MCP protocol version
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Versions a client may request and get echoed back
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26", "2025-06-18"];

pub const SERVER_NAME: &str = "openwebui_agents";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        DispatcherConfig, JsonRpcError, McpDispatcher, McpHandler, McpRequest, McpResponse,
        Session, SseTransport, StdioTransport, TaskExecutor, Transport,
    };
}
