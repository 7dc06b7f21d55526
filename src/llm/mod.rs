//! Chat-completion client and wire types.
//!
//! The request/response shapes here follow the OpenAI-compatible
//! chat-completions contract: messages with optional `tool_calls` /
//! `tool_call_id`, tool schemas, and a `tool_choice` that is either
//! `"auto"` or pinned to one function.

pub mod openai;

pub use openai::OpenAiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while talking to the model provider.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Missing credentials or unusable client settings. Fatal before any round.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Connection failure or timeout.
    #[error("transport error: {0}")]
    Transport(String),
    /// Non-success HTTP status from the provider.
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    /// Response body missing expected fields or not decodable.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// A model that can answer chat-completion requests.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Verify the client is usable (credentials present, etc.).
    fn check_ready(&self) -> Result<(), LlmError> {
        Ok(())
    }

    /// Send one chat-completion request.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError>;
}

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    /// Assistant turn as returned by the model, with any tool calls it made.
    pub fn assistant(content: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Result of a tool call, linked back by id.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

/// A tool invocation requested by the model.
///
/// On the wire this is `{id, type: "function", function: {name, arguments}}`
/// where `arguments` is JSON-encoded text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireToolCall", into = "WireToolCall")]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub raw_arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

impl From<WireToolCall> for ToolCallRequest {
    fn from(wire: WireToolCall) -> Self {
        Self {
            id: wire.id,
            name: wire.function.name,
            raw_arguments: wire.function.arguments,
        }
    }
}

impl From<ToolCallRequest> for WireToolCall {
    fn from(call: ToolCallRequest) -> Self {
        Self {
            id: call.id,
            kind: function_type(),
            function: WireFunctionCall {
                name: call.name,
                arguments: call.raw_arguments,
            },
        }
    }
}

/// Tool definition advertised to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Which tools the model may call this round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChoice {
    /// Model decides.
    Auto,
    /// Model must call the named function.
    Function(String),
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireToolChoice<'a> {
    Mode(&'static str),
    Function {
        #[serde(rename = "type")]
        kind: &'static str,
        function: WireFunctionName<'a>,
    },
}

#[derive(Serialize)]
struct WireFunctionName<'a> {
    name: &'a str,
}

impl Serialize for ToolChoice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ToolChoice::Auto => WireToolChoice::Mode("auto").serialize(serializer),
            ToolChoice::Function(name) => WireToolChoice::Function {
                kind: "function",
                function: WireFunctionName { name },
            }
            .serialize(serializer),
        }
    }
}

/// Chat-completions request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Chat-completions response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

impl ChatResponse {
    /// Take the first choice's message, or fail if the provider sent none.
    pub fn into_reply(self) -> Result<(ResponseMessage, Option<TokenUsage>), LlmError> {
        let usage = self.usage;
        let message = self
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| LlmError::Protocol("response contained no choices".to_string()))?;
        Ok((message, usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_choice_auto_serializes_as_string() {
        assert_eq!(serde_json::to_value(ToolChoice::Auto).unwrap(), json!("auto"));
    }

    #[test]
    fn test_tool_choice_function_serializes_as_object() {
        let value = serde_json::to_value(ToolChoice::Function("finish_analysis".into())).unwrap();
        assert_eq!(
            value,
            json!({"type": "function", "function": {"name": "finish_analysis"}})
        );
    }

    #[test]
    fn test_assistant_message_wire_shape() {
        let msg = Message::assistant(
            None,
            vec![ToolCallRequest {
                id: "call_1".into(),
                name: "list_files".into(),
                raw_arguments: r#"{"pattern":"src/**"}"#.into(),
            }],
        );
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "list_files", "arguments": "{\"pattern\":\"src/**\"}"}
                }]
            })
        );
    }

    #[test]
    fn test_tool_message_wire_shape() {
        let value = serde_json::to_value(Message::tool("call_9", "ok")).unwrap();
        assert_eq!(
            value,
            json!({"role": "tool", "content": "ok", "tool_call_id": "call_9"})
        );
    }

    #[test]
    fn test_parse_response_with_tool_calls() {
        let body = json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_a",
                        "type": "function",
                        "function": {"name": "search_code", "arguments": "{\"pattern\":\"<button\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 120, "completion_tokens": 30, "total_tokens": 150}
        });
        let response: ChatResponse = serde_json::from_value(body).unwrap();
        let (message, usage) = response.into_reply().unwrap();
        let calls = message.tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "search_code");
        assert_eq!(calls[0].raw_arguments, r#"{"pattern":"<button"}"#);
        assert_eq!(usage.unwrap().total_tokens, 150);
    }

    #[test]
    fn test_response_without_choices_is_protocol_error() {
        let response: ChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(response.into_reply(), Err(LlmError::Protocol(_))));
    }
}
