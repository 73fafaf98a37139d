//! Common types used across the gateway

use crate::error::{ErrorKind, GatewayError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Description used when the upstream model record carries none
pub const DEFAULT_AGENT_DESCRIPTION: &str = "No description available";

/// A remote model exposed as an invocable agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Stable upstream model id, used for all addressing
    pub id: String,
    pub display_name: String,
    pub description: String,
}

impl Agent {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            description: description.into(),
        }
    }

    /// Agent whose display name is its id and whose description is the default
    pub fn bare(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            description: DEFAULT_AGENT_DESCRIPTION.to_string(),
        }
    }
}

/// One-off generation task addressed to an agent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskRequest {
    pub agent_id: String,
    pub prompt: String,
    /// Completion options forwarded to the upstream (temperature, max_tokens, ...)
    pub parameters: Map<String, Value>,
}

impl TaskRequest {
    pub fn new(agent_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            prompt: prompt.into(),
            parameters: Map::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }
}

/// Outcome of a [`TaskRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskResult {
    Success { text: String },
    Failure { kind: ErrorKind, message: String },
}

impl TaskResult {
    pub fn success(text: impl Into<String>) -> Self {
        TaskResult::Success { text: text.into() }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        TaskResult::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskResult::Success { .. })
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            TaskResult::Success { .. } => None,
            TaskResult::Failure { kind, .. } => Some(*kind),
        }
    }
}

impl From<GatewayError> for TaskResult {
    fn from(err: GatewayError) -> Self {
        TaskResult::failure(err.kind(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamError;
    use serde_json::json;

    #[test]
    fn test_bare_agent_defaults() {
        let agent = Agent::bare("llama3");
        assert_eq!(agent.display_name, "llama3");
        assert_eq!(agent.description, DEFAULT_AGENT_DESCRIPTION);
    }

    #[test]
    fn test_task_result_from_error_keeps_kind() {
        let result: TaskResult = GatewayError::from(UpstreamError::timeout("60s elapsed")).into();
        assert_eq!(result.kind(), Some(ErrorKind::Timeout));
        assert!(!result.is_success());
    }

    #[test]
    fn test_task_result_serialization() {
        let value = serde_json::to_value(TaskResult::failure(ErrorKind::Forbidden, "nope")).unwrap();
        assert_eq!(
            value,
            json!({"status": "failure", "kind": "forbidden", "message": "nope"})
        );
    }
}
