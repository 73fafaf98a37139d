//! Upstream Client Trait
//!
//! The seam between the gateway and the remote model catalog. The gateway
//! only ever talks to `dyn UpstreamClient`, so tests substitute in-memory
//! implementations.

use async_trait::async_trait;
use owui_core::{Agent, UpstreamError};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Remote catalog / completion API
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// List the models that can be exposed as agents
    async fn list_models(&self) -> Result<Vec<Agent>, UpstreamError>;

    /// Run a single-turn completion against `model_id`
    async fn complete(
        &self,
        model_id: &str,
        prompt: &str,
        parameters: &Map<String, Value>,
    ) -> Result<String, UpstreamError>;
}

/// Shared upstream handle for dynamic dispatch
pub type SharedUpstream = Arc<dyn UpstreamClient>;
