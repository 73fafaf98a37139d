//! owui-upstream: OpenWebUI API Integration
//!
//! ## Endpoints
//!
//! | Purpose | Method | Path |
//! |---------|--------|------|
//! | Model catalog | GET | `/api/models` |
//! | Chat completion | POST | `/api/chat/completions` |
//!
//! ## Authentication
//! - Header: `Authorization: Bearer {OPENWEBUI_API_KEY}`
//!
//! The client performs exactly one network call per operation and never
//! retries; retry policy belongs to the caller.

pub mod client;
pub mod openwebui;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use client::{SharedUpstream, UpstreamClient};
pub use openwebui::{OpenWebUiClient, OpenWebUiConfig};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::client::{SharedUpstream, UpstreamClient};
    pub use super::openwebui::{OpenWebUiClient, OpenWebUiConfig};
}
