use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Map, Value};

use super::base::{ModelParams, ModelVersion, Provider, Usage};
use super::configs::ProviderSettings;
use super::factory::ProviderType;
use super::utils::{build_client, debug_dump, send};
use crate::errors::{Error, Result};
use crate::models::conversation::Conversation;
use crate::models::message::{Message, ProviderPayload};
use crate::models::role::Role;
use crate::tool::Tool;

pub const ANTHROPIC_HOST: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    host: String,
    api_key: String,
}

impl AnthropicProvider {
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            host: settings.host_or(ANTHROPIC_HOST),
            api_key: settings.api_key.clone(),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
    }

    fn tools_to_anthropic_spec(tools: &[Tool]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.parameters.to_json_schema(true),
                })
            })
            .collect()
    }

    /// Turn the conversation into anthropic turns. Consecutive messages with the same
    /// wire role share one turn, since the api requires roles to alternate.
    fn messages_to_anthropic_spec(conversation: &Conversation) -> Vec<Value> {
        let mut turns: Vec<Value> = Vec::new();

        for message in conversation.messages() {
            let (role, block) = match message.role {
                Role::User => ("user", json!({"type": "text", "text": message.content})),
                Role::Tool => (
                    "user",
                    json!({
                        "type": "tool_result",
                        "tool_use_id": message.tool_id().unwrap_or_default(),
                        "content": message.content,
                    }),
                ),
                Role::Assistant => {
                    let replayed = message
                        .payload()
                        .and_then(|p| p.replay_for(ProviderType::Anthropic))
                        .cloned();
                    match (replayed, message.as_tool_call()) {
                        (Some(block), _) => ("assistant", block),
                        (None, Some(call)) => (
                            "assistant",
                            json!({
                                "type": "tool_use",
                                "id": call.id,
                                "name": call.name,
                                "input": arguments_as_object(&message.content),
                            }),
                        ),
                        // The api rejects empty text blocks
                        (None, None) if message.content.is_empty() => continue,
                        (None, None) => {
                            ("assistant", json!({"type": "text", "text": message.content}))
                        }
                    }
                }
                Role::Error => {
                    tracing::debug!("dropping error message from anthropic request");
                    continue;
                }
            };

            match turns.last_mut() {
                Some(last) if last["role"] == role => {
                    if let Some(content) = last["content"].as_array_mut() {
                        content.push(block);
                    }
                }
                _ => turns.push(json!({"role": role, "content": [block]})),
            }
        }

        turns
    }

    fn response_to_messages(response: &Value) -> Result<Vec<Message>> {
        let blocks = response
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::transport("anthropic complete", "response has no content"))?;

        let mut messages = Vec::with_capacity(blocks.len());
        for block in blocks {
            let message = match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    Message::assistant(block["text"].as_str().unwrap_or_default())
                }
                Some("tool_use") => {
                    let id = block["id"]
                        .as_str()
                        .filter(|id| !id.is_empty())
                        .ok_or_else(|| {
                            Error::Protocol("anthropic returned a tool_use block without an id".into())
                        })?;
                    let name = block["name"].as_str().ok_or_else(|| {
                        Error::Protocol("anthropic returned a tool_use block without a name".into())
                    })?;
                    let input = match &block["input"] {
                        Value::Null => String::new(),
                        input => input.to_string(),
                    };
                    Message::tool_call(id, name, input)
                }
                other => {
                    return Err(Error::Protocol(format!(
                        "anthropic returned a content block of type '{}'",
                        other.unwrap_or("unknown")
                    )))
                }
            };
            messages.push(message.with_payload(ProviderPayload::new(
                ProviderType::Anthropic,
                block.clone(),
            )));
        }

        if messages.is_empty() {
            messages.push(Message::assistant(""));
        }
        Ok(messages)
    }

    fn get_usage(response: &Value) -> Usage {
        let usage = &response["usage"];
        Usage::new(
            usage["input_tokens"].as_u64().unwrap_or(0),
            usage["output_tokens"].as_u64().unwrap_or(0),
        )
    }
}

/// Anthropic wants `input` as an object even when the stored blob is empty or broken
fn arguments_as_object(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => value,
        _ => Value::Object(Map::new()),
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn kind(&self) -> ProviderType {
        ProviderType::Anthropic
    }

    async fn complete(
        &self,
        params: &ModelParams,
        conversation: &Conversation,
        tools: &[Tool],
    ) -> Result<(Vec<Message>, Usage)> {
        let mut payload = json!({
            "model": params.model,
            "messages": Self::messages_to_anthropic_spec(conversation),
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });
        if let Some(system) = conversation.system() {
            payload["system"] = json!(system);
        }
        if !tools.is_empty() {
            payload["tools"] = json!(Self::tools_to_anthropic_spec(tools));
        }
        if params.debug {
            debug_dump("req", &payload);
        }

        let url = format!("{}/v1/messages", self.host);
        let request = self.authorized(self.client.post(&url)).json(&payload);
        let response = send("anthropic complete", request).await?;
        if params.debug {
            debug_dump("resp", &response);
        }

        let messages = Self::response_to_messages(&response)?;
        Ok((messages, Self::get_usage(&response)))
    }

    async fn list_models(&self) -> Result<Vec<ModelVersion>> {
        let url = format!("{}/v1/models", self.host);
        let mut models = Vec::new();
        let mut after_id: Option<String> = None;

        loop {
            let mut request = self.client.get(&url).query(&[("limit", "100")]);
            if let Some(after) = &after_id {
                request = request.query(&[("after_id", after)]);
            }
            let page = send("anthropic list_models", self.authorized(request)).await?;

            let data = page
                .get("data")
                .and_then(Value::as_array)
                .ok_or_else(|| Error::transport("anthropic list_models", "response has no data"))?;
            for model in data {
                if let Some(id) = model.get("id").and_then(Value::as_str) {
                    let name = model
                        .get("display_name")
                        .and_then(Value::as_str)
                        .unwrap_or(id);
                    models.push(ModelVersion::new(ProviderType::Anthropic, id, name));
                }
            }

            let has_more = page["has_more"].as_bool().unwrap_or(false);
            match page["last_id"].as_str() {
                Some(last) if has_more => after_id = Some(last.to_string()),
                _ => break,
            }
        }

        Ok(models)
    }
}
