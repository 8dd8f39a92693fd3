use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::role::Role;
use crate::providers::factory::ProviderType;

/// Identifies one tool invocation: the tool requested and the id the backend gave the call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRef {
    pub id: String,
    pub name: String,
}

/// The unit a backend originally returned, kept so it can be replayed verbatim.
///
/// Only the provider that produced a payload reads it back; every other provider
/// works from the normalized fields of the message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", content = "data", rename_all = "lowercase")]
pub enum ProviderPayload {
    /// An anthropic content block (`text` or `tool_use`)
    Anthropic(Value),
    /// An entry of an openai `tool_calls` array
    OpenAi(Value),
    /// An entry of an openrouter `tool_calls` array
    OpenRouter(Value),
    /// An entry of an ollama `tool_calls` array
    Ollama(Value),
    /// A gemini content part
    Google(Value),
}

impl ProviderPayload {
    /// Tag a backend unit with the provider that produced it
    pub fn new(provider: ProviderType, data: Value) -> Self {
        match provider {
            ProviderType::Anthropic => ProviderPayload::Anthropic(data),
            ProviderType::OpenAi => ProviderPayload::OpenAi(data),
            ProviderType::OpenRouter => ProviderPayload::OpenRouter(data),
            ProviderType::Ollama => ProviderPayload::Ollama(data),
            ProviderType::Google => ProviderPayload::Google(data),
        }
    }

    /// The raw unit, but only for the provider that produced it
    pub fn replay_for(&self, provider: ProviderType) -> Option<&Value> {
        if self.provider_type() == provider {
            Some(self.data())
        } else {
            None
        }
    }

    fn data(&self) -> &Value {
        match self {
            ProviderPayload::Anthropic(data)
            | ProviderPayload::OpenAi(data)
            | ProviderPayload::OpenRouter(data)
            | ProviderPayload::Ollama(data)
            | ProviderPayload::Google(data) => data,
        }
    }

    pub fn provider_type(&self) -> ProviderType {
        match self {
            ProviderPayload::Anthropic(_) => ProviderType::Anthropic,
            ProviderPayload::OpenAi(_) => ProviderType::OpenAi,
            ProviderPayload::OpenRouter(_) => ProviderType::OpenRouter,
            ProviderPayload::Ollama(_) => ProviderType::Ollama,
            ProviderPayload::Google(_) => ProviderType::Google,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A message to or from an LLM
pub struct Message {
    pub role: Role,
    /// Prose for user/assistant, the raw argument blob for a tool call,
    /// the tool output for a tool result
    pub content: String,
    /// Set only on tool calls and on the results answering them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolCallRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<ProviderPayload>,
}

impl Message {
    fn new<S: Into<String>>(role: Role, content: S) -> Self {
        Message {
            role,
            content: content.into(),
            tool: None,
            payload: None,
        }
    }

    pub fn user<S: Into<String>>(text: S) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant<S: Into<String>>(text: S) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn error<S: Into<String>>(text: S) -> Self {
        Self::new(Role::Error, text)
    }

    /// A model's request to run `name`; `arguments` is kept exactly as the backend sent it
    pub fn tool_call<I, N, A>(id: I, name: N, arguments: A) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        A: Into<String>,
    {
        Message {
            tool: Some(ToolCallRef {
                id: id.into(),
                name: name.into(),
            }),
            ..Self::new(Role::Assistant, arguments)
        }
    }

    /// The output of a tool, answering the call with the same id
    pub fn tool_result<S: Into<String>>(call: &ToolCallRef, output: S) -> Self {
        Message {
            tool: Some(call.clone()),
            ..Self::new(Role::Tool, output)
        }
    }

    pub fn with_payload(mut self, payload: ProviderPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn is_tool_call(&self) -> bool {
        self.role == Role::Assistant && self.tool.is_some()
    }

    /// The call this message requests, if it is a tool call
    pub fn as_tool_call(&self) -> Option<&ToolCallRef> {
        if self.role == Role::Assistant {
            self.tool.as_ref()
        } else {
            None
        }
    }

    pub fn tool_name(&self) -> Option<&str> {
        self.tool.as_ref().map(|t| t.name.as_str())
    }

    pub fn tool_id(&self) -> Option<&str> {
        self.tool.as_ref().map(|t| t.id.as_str())
    }

    pub fn payload(&self) -> Option<&ProviderPayload> {
        self.payload.as_ref()
    }
}
