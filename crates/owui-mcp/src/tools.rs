//! MCP tool definitions for the agent operations

use serde_json::{json, Value};

pub const LIST_AGENTS: &str = "list_agents";
pub const DESCRIBE_AGENT: &str = "describe_agent";
pub const INVOKE_AGENT: &str = "invoke_agent";

/// Older clients call the chat tool by this name
pub const INVOKE_AGENT_ALIAS: &str = "openwebui_chat";

pub fn tool_definitions() -> Value {
    json!({
        "tools": [
            {
                "name": LIST_AGENTS,
                "description": "List the OpenWebUI agents this gateway exposes",
                "inputSchema": {
                    "type": "object",
                    "properties": {}
                }
            },
            {
                "name": DESCRIBE_AGENT,
                "description": "Show the display name and description of one agent",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "description": "Agent id" }
                    },
                    "required": ["id"]
                }
            },
            {
                "name": INVOKE_AGENT,
                "description": "Send a prompt to an OpenWebUI agent and return its reply",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "description": "Agent id" },
                        "prompt": { "type": "string", "description": "User message" },
                        "parameters": {
                            "type": "object",
                            "description": "Extra completion parameters such as temperature"
                        }
                    },
                    "required": ["id", "prompt"]
                }
            }
        ]
    })
}

/// Successful tool output as MCP content
pub fn text_content(text: impl Into<String>) -> Value {
    json!({
        "content": [{ "type": "text", "text": text.into() }],
        "isError": false
    })
}

/// Failed tool output; the kind rides in `_meta`
pub fn error_content(kind: &str, message: impl Into<String>) -> Value {
    json!({
        "content": [{ "type": "text", "text": message.into() }],
        "isError": true,
        "_meta": { "kind": kind }
    })
}
