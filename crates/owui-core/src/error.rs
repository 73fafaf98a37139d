//! Error types for the agent gateway
//!
//! Every failure a client can observe is described by an [`ErrorKind`] with a
//! stable snake_case name. The concrete error types below all map onto it.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable, client-visible error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    // Upstream
    Timeout,
    AuthFailed,
    BadRequest,
    ServerError,
    Network,
    // Protocol
    NotInitialized,
    Closed,
    UnknownMethod,
    InvalidParams,
    // Policy / catalog
    Forbidden,
    NotFound,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::AuthFailed => "auth_failed",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::ServerError => "server_error",
            ErrorKind::Network => "network",
            ErrorKind::NotInitialized => "not_initialized",
            ErrorKind::Closed => "closed",
            ErrorKind::UnknownMethod => "unknown_method",
            ErrorKind::InvalidParams => "invalid_params",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
        }
    }

    /// JSON-RPC error code used on the wire
    pub fn rpc_code(&self) -> i32 {
        match self {
            ErrorKind::UnknownMethod => -32601,
            ErrorKind::InvalidParams => -32602,
            ErrorKind::NotInitialized => -32002,
            ErrorKind::Closed => -32003,
            ErrorKind::NotFound => -32004,
            ErrorKind::Forbidden => -32005,
            ErrorKind::Timeout => -32010,
            ErrorKind::AuthFailed => -32011,
            ErrorKind::BadRequest => -32012,
            ErrorKind::ServerError => -32013,
            ErrorKind::Network => -32014,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// UPSTREAM
// =============================================================================

/// Failure classes reported by the upstream client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamErrorKind {
    Timeout,
    AuthFailed,
    BadRequest,
    ServerError,
    Network,
}

impl UpstreamErrorKind {
    /// Transient failures are the only ones worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, UpstreamErrorKind::Timeout | UpstreamErrorKind::Network)
    }
}

impl From<UpstreamErrorKind> for ErrorKind {
    fn from(kind: UpstreamErrorKind) -> Self {
        match kind {
            UpstreamErrorKind::Timeout => ErrorKind::Timeout,
            UpstreamErrorKind::AuthFailed => ErrorKind::AuthFailed,
            UpstreamErrorKind::BadRequest => ErrorKind::BadRequest,
            UpstreamErrorKind::ServerError => ErrorKind::ServerError,
            UpstreamErrorKind::Network => ErrorKind::Network,
        }
    }
}

impl fmt::Display for UpstreamErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ErrorKind::from(*self).fmt(f)
    }
}

/// Error returned by the upstream model catalog / completion API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("upstream {kind}: {message}")]
pub struct UpstreamError {
    pub kind: UpstreamErrorKind,
    pub message: String,
}

impl UpstreamError {
    pub fn new(kind: UpstreamErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Timeout, msg)
    }

    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::AuthFailed, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::BadRequest, msg)
    }

    pub fn server_error(msg: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::ServerError, msg)
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Network, msg)
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

// =============================================================================
// PROTOCOL
// =============================================================================

/// Failure classes raised by the protocol dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolErrorKind {
    NotInitialized,
    Closed,
    UnknownMethod,
    InvalidParams,
}

impl From<ProtocolErrorKind> for ErrorKind {
    fn from(kind: ProtocolErrorKind) -> Self {
        match kind {
            ProtocolErrorKind::NotInitialized => ErrorKind::NotInitialized,
            ProtocolErrorKind::Closed => ErrorKind::Closed,
            ProtocolErrorKind::UnknownMethod => ErrorKind::UnknownMethod,
            ProtocolErrorKind::InvalidParams => ErrorKind::InvalidParams,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ProtocolError {
    pub kind: ProtocolErrorKind,
    pub message: String,
}

impl ProtocolError {
    pub fn not_initialized(method: &str) -> Self {
        Self {
            kind: ProtocolErrorKind::NotInitialized,
            message: format!("Session not initialized; '{}' requires initialize first", method),
        }
    }

    pub fn closed(method: &str) -> Self {
        Self {
            kind: ProtocolErrorKind::Closed,
            message: format!("Session closed; '{}' rejected", method),
        }
    }

    pub fn unknown_method(method: &str) -> Self {
        Self {
            kind: ProtocolErrorKind::UnknownMethod,
            message: format!("Method not found: {}", method),
        }
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self {
            kind: ProtocolErrorKind::InvalidParams,
            message: msg.into(),
        }
    }
}

// =============================================================================
// POLICY
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Agent '{0}' is not permitted by the gateway filter policy")]
    Forbidden(String),
}

// =============================================================================
// GATEWAY
// =============================================================================

/// Main error type for request handling
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("{0}")]
    NotFound(String),
}

impl GatewayError {
    /// Agent absent from the filtered catalog
    pub fn agent_not_found(agent_id: &str, available: &[&str]) -> Self {
        GatewayError::NotFound(format!(
            "Agent '{}' is not available. Available agents are: {}",
            agent_id,
            available.join(", ")
        ))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Upstream(e) => e.kind.into(),
            GatewayError::Protocol(e) => e.kind.into(),
            GatewayError::Policy(PolicyError::Forbidden(_)) => ErrorKind::Forbidden,
            GatewayError::NotFound(_) => ErrorKind::NotFound,
        }
    }
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, GatewayError>;

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
