//! Core types and utilities for the OpenWebUI agent gateway
//!
//! # Modules
//!
//! - `config`: Gateway configuration (defaults, file, environment)
//! - `error`: Error taxonomy shared by every layer
//! - `types`: Agent and task types

pub mod config;
pub mod error;
pub mod types;

// Re-exports
pub use config::{load_environment, GatewayConfig};
pub use error::{
    ConfigError, ErrorKind, GatewayError, PolicyError, ProtocolError, ProtocolErrorKind, Result,
    UpstreamError, UpstreamErrorKind,
};
pub use types::{Agent, TaskRequest, TaskResult, DEFAULT_AGENT_DESCRIPTION};
