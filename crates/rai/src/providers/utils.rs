use chrono::Utc;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;

use super::base::{ModelParams, Usage};
use super::factory::ProviderType;
use crate::errors::{Error, Result};
use crate::models::conversation::Conversation;
use crate::models::message::{Message, ProviderPayload};
use crate::models::role::Role;
use crate::tool::Tool;

/// Build the HTTP client every provider uses
pub fn build_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(600)) // 10 minutes timeout
        .build()
        .map_err(|e| Error::transport("building http client", e))
}

/// Send a request and decode the JSON body, wrapping any failure with `context`
pub async fn send(context: &str, request: RequestBuilder) -> Result<Value> {
    let response = request
        .send()
        .await
        .map_err(|e| Error::transport(context, e))?;

    match response.status() {
        status if status.is_success() => response
            .json()
            .await
            .map_err(|e| Error::transport(context, e)),
        status if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() => {
            Err(Error::transport(context, format!("Server error: {}", status)))
        }
        status => {
            let error_text = response.text().await.unwrap_or_default();
            Err(Error::transport(
                context,
                format!("Request failed: {} - {}", status, error_text),
            ))
        }
    }
}

/// Write `payload` as pretty JSON to `<tmp>/rai/debug/<timestamp>-<name>.json`.
///
/// Failures are logged and otherwise ignored.
pub fn debug_dump(name: &str, payload: &Value) -> Option<PathBuf> {
    let dir = std::env::temp_dir().join("rai").join("debug");
    let file = dir.join(format!(
        "{}-{}.json",
        Utc::now().format("%Y%m%dT%H%M%S%.9f"),
        name
    ));

    let written = std::fs::create_dir_all(&dir).and_then(|_| {
        let pretty = serde_json::to_string_pretty(payload)?;
        std::fs::write(&file, pretty)
    });

    match written {
        Ok(()) => {
            tracing::info!("Saving debug output to {}", file.display());
            Some(file)
        }
        Err(e) => {
            tracing::warn!("Could not write debug output to {}: {}", file.display(), e);
            None
        }
    }
}

const GENERATED_CALL_ID_PREFIX: &str = "rai_call_";

/// A fresh id for a tool call the backend did not name
pub fn new_call_id() -> String {
    format!("{}{}", GENERATED_CALL_ID_PREFIX, uuid::Uuid::new_v4().simple())
}

/// Whether `id` was made up by [`new_call_id`] rather than sent by a backend
pub fn is_generated_call_id(id: &str) -> bool {
    id.starts_with(GENERATED_CALL_ID_PREFIX)
}

/// Convert the conversation to an openai style `messages` array.
///
/// Used by every openai compatible backend; `provider` decides which stored
/// payloads may be replayed.
pub fn messages_to_openai_spec(conversation: &Conversation, provider: ProviderType) -> Vec<Value> {
    let mut messages_spec: Vec<Value> = Vec::new();

    if let Some(system) = conversation.system() {
        messages_spec.push(json!({
            "role": "system",
            "content": system
        }));
    }

    for message in conversation.messages() {
        match message.role {
            Role::User => messages_spec.push(json!({
                "role": "user",
                "content": message.content
            })),
            Role::Assistant => match message.as_tool_call() {
                Some(call) => {
                    let tool_call = message
                        .payload
                        .as_ref()
                        .and_then(|p| p.replay_for(provider))
                        .cloned()
                        .unwrap_or_else(|| {
                            json!({
                                "id": call.id,
                                "type": "function",
                                "function": {
                                    "name": call.name,
                                    "arguments": message.content,
                                }
                            })
                        });

                    // Calls from one reply belong to a single assistant message
                    match messages_spec.last_mut() {
                        Some(last) if last["role"] == "assistant" => {
                            if let Some(calls) =
                                last.get_mut("tool_calls").and_then(Value::as_array_mut)
                            {
                                calls.push(tool_call);
                            } else {
                                last["tool_calls"] = json!([tool_call]);
                            }
                        }
                        _ => messages_spec.push(json!({
                            "role": "assistant",
                            "content": null,
                            "tool_calls": [tool_call]
                        })),
                    }
                }
                None => messages_spec.push(json!({
                    "role": "assistant",
                    "content": message.content
                })),
            },
            Role::Tool => messages_spec.push(json!({
                "role": "tool",
                "content": message.content,
                "tool_call_id": message.tool_id().unwrap_or_default()
            })),
            Role::Error => {
                tracing::debug!("dropping error message from {} request", provider);
            }
        }
    }

    messages_spec
}

/// Convert tools to openai `tools` entries
pub fn tools_to_openai_spec(tools: &[Tool], with_required: bool) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters.to_json_schema(with_required),
                }
            })
        })
        .collect()
}

/// Convert an openai chat completion into normalized messages
pub fn openai_response_to_messages(
    response: &Value,
    provider: ProviderType,
) -> Result<Vec<Message>> {
    let choices = response
        .get("choices")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            Error::transport(
                format!("{} complete", provider),
                "response has no choices",
            )
        })?;

    let mut messages = Vec::new();
    for choice in choices {
        let original = &choice["message"];
        let before = messages.len();

        if let Some(text) = original.get("content").and_then(Value::as_str) {
            if !text.is_empty() {
                messages.push(Message::assistant(text));
            }
        }

        if let Some(tool_calls) = original.get("tool_calls").and_then(Value::as_array) {
            for tool_call in tool_calls {
                messages.push(openai_tool_call_to_message(tool_call, provider)?);
            }
        }

        if messages.len() == before {
            messages.push(Message::assistant(""));
        }
    }

    Ok(messages)
}

fn openai_tool_call_to_message(tool_call: &Value, provider: ProviderType) -> Result<Message> {
    match tool_call.get("type").and_then(Value::as_str) {
        None | Some("function") => {}
        Some(other) => {
            return Err(Error::Protocol(format!(
                "{} returned a tool call of type '{}'",
                provider, other
            )))
        }
    }

    let id = tool_call
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .unwrap_or_else(new_call_id);
    let function = &tool_call["function"];
    let name = function
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Protocol(format!("{} returned a tool call without a name", provider)))?;

    // Some compatible servers send the arguments as an object instead of a string
    let arguments = match function.get("arguments") {
        Some(Value::String(raw)) => raw.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    Ok(Message::tool_call(id, name, arguments)
        .with_payload(ProviderPayload::new(provider, tool_call.clone())))
}

/// The body of an openai style chat completion request
pub fn openai_chat_payload(
    params: &ModelParams,
    conversation: &Conversation,
    tools: &[Tool],
    provider: ProviderType,
    with_required: bool,
) -> Value {
    let mut payload = json!({
        "model": params.model,
        "messages": messages_to_openai_spec(conversation, provider),
        "max_tokens": params.max_tokens,
        "temperature": params.temperature,
    });

    if !tools.is_empty() {
        payload["tools"] = json!(tools_to_openai_spec(tools, with_required));
    }

    payload
}

/// Token usage from an openai style `usage` object; zero when absent
pub fn openai_usage(response: &Value) -> Usage {
    let usage = &response["usage"];
    Usage::new(
        usage["prompt_tokens"].as_u64().unwrap_or(0),
        usage["completion_tokens"].as_u64().unwrap_or(0),
    )
}

/// Turn an `error` object in a successful response body into a transport error
pub fn check_openai_error(response: &Value, context: &str) -> Result<()> {
    match response.get("error") {
        Some(Value::Null) | None => Ok(()),
        Some(error) => {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| error.to_string());
            Err(Error::transport(context, format!("API error: {}", message)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::ToolCallRef;
    use schemars::JsonSchema;
    use serde::Deserialize;

    const OPENAI_TOOL_USE_RESPONSE: &str = r#"{
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "1",
                    "type": "function",
                    "function": {
                        "name": "example_fn",
                        "arguments": "{\"param\": \"value\"}"
                    }
                }]
            }
        }],
        "usage": {
            "prompt_tokens": 10,
            "completion_tokens": 25,
            "total_tokens": 35
        }
    }"#;

    #[derive(Deserialize, JsonSchema)]
    struct TestInput {
        /// Test parameter
        input: String,
    }

    #[test]
    fn test_messages_to_openai_spec() {
        let conversation = Conversation::from(vec![Message::user("Hello")]).with_system("Be nice");
        let spec = messages_to_openai_spec(&conversation, ProviderType::OpenAi);

        assert_eq!(spec.len(), 2);
        assert_eq!(spec[0]["role"], "system");
        assert_eq!(spec[0]["content"], "Be nice");
        assert_eq!(spec[1]["role"], "user");
        assert_eq!(spec[1]["content"], "Hello");
    }

    #[test]
    fn test_messages_to_openai_spec_complex() {
        let call = ToolCallRef {
            id: "tool1".to_string(),
            name: "example".to_string(),
        };
        let conversation = Conversation::from(vec![
            Message::assistant("Hello!"),
            Message::user("How are you?"),
            Message::assistant("Let me check."),
            Message::tool_call("tool1", "example", r#"{"param1":"value1"}"#),
            Message::tool_call("tool2", "example", r#"{"param1":"value2"}"#),
            Message::tool_result(&call, "Result"),
            Message::error("local failure"),
        ]);

        let spec = messages_to_openai_spec(&conversation, ProviderType::OpenAi);

        assert_eq!(spec.len(), 4);
        assert_eq!(spec[0]["role"], "assistant");
        assert_eq!(spec[0]["content"], "Hello!");
        assert_eq!(spec[1]["role"], "user");
        assert_eq!(spec[2]["role"], "assistant");
        assert_eq!(spec[2]["content"], "Let me check.");
        assert_eq!(spec[2]["tool_calls"].as_array().map(Vec::len), Some(2));
        assert_eq!(spec[2]["tool_calls"][0]["function"]["name"], "example");
        assert_eq!(
            spec[2]["tool_calls"][1]["function"]["arguments"],
            r#"{"param1":"value2"}"#
        );
        assert_eq!(spec[3]["role"], "tool");
        assert_eq!(spec[3]["content"], "Result");
        assert_eq!(spec[3]["tool_call_id"], spec[2]["tool_calls"][0]["id"]);
    }

    #[test]
    fn test_payload_replayed_only_for_same_provider() {
        let raw = json!({
            "id": "call_9",
            "type": "function",
            "function": {"name": "example", "arguments": "{ \"a\" : 1 }"},
            "index": 0
        });
        let message = Message::tool_call("call_9", "example", "{ \"a\" : 1 }")
            .with_payload(ProviderPayload::new(ProviderType::OpenRouter, raw.clone()));
        let conversation = Conversation::from(vec![message]);

        let same = messages_to_openai_spec(&conversation, ProviderType::OpenRouter);
        assert_eq!(same[0]["tool_calls"][0], raw);

        let other = messages_to_openai_spec(&conversation, ProviderType::OpenAi);
        assert!(other[0]["tool_calls"][0].get("index").is_none());
        assert_eq!(other[0]["tool_calls"][0]["id"], "call_9");
    }

    #[test]
    fn test_tools_to_openai_spec() {
        let tool = Tool::new("test_tool", "A test tool", |input: TestInput| input.input);

        let spec = tools_to_openai_spec(&[tool], true);

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["type"], "function");
        assert_eq!(spec[0]["function"]["name"], "test_tool");
        assert_eq!(spec[0]["function"]["description"], "A test tool");
        assert_eq!(
            spec[0]["function"]["parameters"]["properties"]["input"]["description"],
            "Test parameter"
        );
        assert_eq!(spec[0]["function"]["parameters"]["required"], json!(["input"]));
    }

    #[test]
    fn test_tools_to_openai_spec_empty() {
        assert!(tools_to_openai_spec(&[], true).is_empty());
    }

    #[test]
    fn test_openai_response_to_messages_text() -> Result<()> {
        let response = json!({
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "Hello from John Cena!"
                }
            }]
        });

        let messages = openai_response_to_messages(&response, ProviderType::OpenAi)?;
        assert_eq!(messages, vec![Message::assistant("Hello from John Cena!")]);
        assert_eq!(openai_usage(&response), Usage::default());
        Ok(())
    }

    #[test]
    fn test_openai_response_to_messages_tool_request() -> Result<()> {
        let response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE).unwrap();
        let messages = openai_response_to_messages(&response, ProviderType::OpenAi)?;

        assert_eq!(messages.len(), 1);
        let message = &messages[0];
        assert!(message.is_tool_call());
        assert_eq!(message.tool_name(), Some("example_fn"));
        assert_eq!(message.tool_id(), Some("1"));
        // arguments are passed through untouched
        assert_eq!(message.content, "{\"param\": \"value\"}");
        assert_eq!(
            message.payload,
            Some(ProviderPayload::OpenAi(
                response["choices"][0]["message"]["tool_calls"][0].clone()
            ))
        );
        assert_eq!(openai_usage(&response), Usage::new(10, 25));
        Ok(())
    }

    #[test]
    fn test_openai_response_object_arguments_and_missing_id() -> Result<()> {
        let response = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [{
                        "function": {"name": "example_fn", "arguments": {"param": "value"}}
                    }]
                }
            }]
        });

        let messages = openai_response_to_messages(&response, ProviderType::Ollama)?;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, r#"{"param":"value"}"#);
        assert!(messages[0].tool_id().is_some_and(is_generated_call_id));
        assert!(!is_generated_call_id("call_abc"));
        Ok(())
    }

    #[test]
    fn test_openai_response_unknown_tool_call_type() {
        let response = json!({
            "choices": [{
                "message": {
                    "tool_calls": [{"id": "1", "type": "retrieval", "function": {"name": "x"}}]
                }
            }]
        });

        let result = openai_response_to_messages(&response, ProviderType::OpenAi);
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[test]
    fn test_openai_response_without_choices() {
        let result = openai_response_to_messages(&json!({"id": "x"}), ProviderType::OpenAi);
        assert!(matches!(result, Err(Error::Transport { .. })));
    }

    #[test]
    fn test_check_openai_error() {
        assert!(check_openai_error(&json!({"choices": []}), "openai complete").is_ok());
        assert!(check_openai_error(&json!({"error": null}), "openai complete").is_ok());

        let err = check_openai_error(
            &json!({"error": {"message": "No endpoints found", "code": 404}}),
            "openrouter complete",
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "openrouter complete: API error: No endpoints found"
        );
    }

    #[test]
    fn test_debug_dump_writes_file() {
        let path = debug_dump("test-req", &json!({"model": "m"})).expect("dump written");
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"model\": \"m\""));
        let _ = std::fs::remove_file(path);
    }
}
