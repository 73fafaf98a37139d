//! Task Executor
//!
//! Runs one generation task against an agent from the filtered catalog.
//! Order of checks: policy, catalog membership, prompt, then upstream.

use owui_catalog::AgentCatalog;
use owui_core::{GatewayError, ProtocolError, TaskRequest, TaskResult, UpstreamError};
use owui_upstream::SharedUpstream;
use std::time::Instant;
use tracing::{debug, info, warn};

const PROMPT_LOG_CHARS: usize = 100;

pub struct TaskExecutor {
    catalog: AgentCatalog,
    upstream: SharedUpstream,
    retry_transient: bool,
}

impl TaskExecutor {
    pub fn new(catalog: AgentCatalog, upstream: SharedUpstream) -> Self {
        Self {
            catalog,
            upstream,
            retry_transient: false,
        }
    }

    /// Retry once on timeout or network failure
    pub fn with_retry_transient(mut self, enabled: bool) -> Self {
        self.retry_transient = enabled;
        self
    }

    pub async fn run(&self, request: TaskRequest) -> TaskResult {
        match self.execute(&request).await {
            Ok(text) => TaskResult::success(text),
            Err(err) => {
                warn!(agent = %request.agent_id, kind = %err.kind(), "Task failed: {}", err);
                err.into()
            }
        }
    }

    async fn execute(&self, request: &TaskRequest) -> Result<String, GatewayError> {
        let agent = self.catalog.find(&request.agent_id).await?;

        if request.prompt.trim().is_empty() {
            return Err(ProtocolError::invalid_params("prompt must not be empty").into());
        }

        debug!(
            agent = %agent.id,
            prompt = %truncate(&request.prompt, PROMPT_LOG_CHARS),
            "Invoking agent"
        );

        let started = Instant::now();
        let text = self.complete_with_retry(&agent.id, request).await?;
        info!(
            agent = %agent.id,
            elapsed = ?started.elapsed(),
            chars = text.len(),
            "Agent invocation completed"
        );
        Ok(text)
    }

    async fn complete_with_retry(
        &self,
        model_id: &str,
        request: &TaskRequest,
    ) -> Result<String, UpstreamError> {
        let first = self
            .upstream
            .complete(model_id, &request.prompt, &request.parameters)
            .await;

        match first {
            Err(err) if self.retry_transient && err.is_transient() => {
                warn!(agent = %model_id, "Transient upstream failure ({}), retrying once", err);
                self.upstream
                    .complete(model_id, &request.prompt, &request.parameters)
                    .await
            }
            other => other,
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
