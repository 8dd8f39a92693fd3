use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Map, Value};

use super::base::{ModelParams, ModelVersion, Provider, Usage};
use super::configs::ProviderSettings;
use super::factory::ProviderType;
use super::utils::{build_client, debug_dump, is_generated_call_id, new_call_id, send};
use crate::errors::{Error, Result};
use crate::models::conversation::Conversation;
use crate::models::message::{Message, ProviderPayload};
use crate::models::role::Role;
use crate::tool::Tool;

pub const GOOGLE_HOST: &str = "https://generativelanguage.googleapis.com";

/// Gemini through the `generateContent` REST endpoint
pub struct GoogleProvider {
    client: Client,
    host: String,
    api_key: String,
}

impl GoogleProvider {
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            host: settings.host_or(GOOGLE_HOST),
            api_key: settings.api_key.clone(),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("x-goog-api-key", &self.api_key)
    }

    fn tools_to_google_spec(tools: &[Tool]) -> Value {
        let declarations: Vec<Value> = tools
            .iter()
            .map(|tool| {
                let mut declaration = json!({
                    "name": tool.name,
                    "description": tool.description,
                });
                // Gemini refuses an object schema with no properties
                if !tool.parameters.is_empty() {
                    declaration["parameters"] = tool.parameters.to_json_schema(true);
                }
                declaration
            })
            .collect();

        json!([{ "functionDeclarations": declarations }])
    }

    fn messages_to_google_spec(conversation: &Conversation) -> Vec<Value> {
        let mut contents: Vec<Value> = Vec::new();

        for message in conversation.messages() {
            let (role, part) = match message.role {
                Role::User => ("user", json!({"text": message.content})),
                Role::Tool => {
                    let mut response = json!({
                        "name": message.tool_name().unwrap_or_default(),
                        "response": {"result": message.content},
                    });
                    with_backend_id(&mut response, message.tool_id());
                    ("user", json!({ "functionResponse": response }))
                }
                Role::Assistant => {
                    let replayed = message
                        .payload()
                        .and_then(|p| p.replay_for(ProviderType::Google))
                        .cloned();
                    match (replayed, message.as_tool_call()) {
                        (Some(part), _) => ("model", part),
                        (None, Some(call)) => {
                            let mut function_call = json!({
                                "name": call.name,
                                "args": args_as_object(&message.content),
                            });
                            with_backend_id(&mut function_call, Some(call.id.as_str()));
                            ("model", json!({ "functionCall": function_call }))
                        }
                        (None, None) if message.content.is_empty() => continue,
                        (None, None) => ("model", json!({"text": message.content})),
                    }
                }
                Role::Error => {
                    tracing::debug!("dropping error message from google request");
                    continue;
                }
            };

            match contents.last_mut() {
                Some(last) if last["role"] == role => {
                    if let Some(parts) = last["parts"].as_array_mut() {
                        parts.push(part);
                    }
                }
                _ => contents.push(json!({"role": role, "parts": [part]})),
            }
        }

        contents
    }

    fn response_to_messages(response: &Value) -> Result<Vec<Message>> {
        let candidates = response
            .get("candidates")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::transport("google complete", "response has no candidates"))?;

        let mut messages = Vec::new();
        for candidate in candidates {
            let parts = candidate["content"]["parts"]
                .as_array()
                .map(Vec::as_slice)
                .unwrap_or_default();

            for part in parts {
                let message = if let Some(call) = part.get("functionCall") {
                    let name = call["name"].as_str().ok_or_else(|| {
                        Error::Protocol("google returned a functionCall without a name".into())
                    })?;
                    let id = call["id"]
                        .as_str()
                        .filter(|id| !id.is_empty())
                        .map(String::from)
                        .unwrap_or_else(new_call_id);
                    let args = match &call["args"] {
                        Value::Null => String::new(),
                        args => args.to_string(),
                    };
                    Message::tool_call(id, name, args)
                } else if let Some(text) = part.get("text").and_then(Value::as_str) {
                    Message::assistant(text)
                } else {
                    let kind = part
                        .as_object()
                        .and_then(|o| o.keys().next().cloned())
                        .unwrap_or_else(|| "unknown".to_string());
                    return Err(Error::Protocol(format!(
                        "google returned a content part of type '{}'",
                        kind
                    )));
                };
                messages.push(message.with_payload(ProviderPayload::new(
                    ProviderType::Google,
                    part.clone(),
                )));
            }
        }

        if messages.is_empty() {
            messages.push(Message::assistant(""));
        }
        Ok(messages)
    }

    fn get_usage(response: &Value) -> Usage {
        let usage = &response["usageMetadata"];
        Usage::new(
            usage["promptTokenCount"].as_u64().unwrap_or(0),
            usage["candidatesTokenCount"].as_u64().unwrap_or(0),
        )
    }
}

/// Gemini pairs calls and responses by id; ids it never issued are left out
fn with_backend_id(part: &mut Value, id: Option<&str>) {
    if let Some(id) = id.filter(|id| !id.is_empty() && !is_generated_call_id(id)) {
        part["id"] = json!(id);
    }
}

fn args_as_object(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => value,
        _ => Value::Object(Map::new()),
    }
}

#[async_trait]
impl Provider for GoogleProvider {
    fn kind(&self) -> ProviderType {
        ProviderType::Google
    }

    async fn complete(
        &self,
        params: &ModelParams,
        conversation: &Conversation,
        tools: &[Tool],
    ) -> Result<(Vec<Message>, Usage)> {
        let mut payload = json!({
            "contents": Self::messages_to_google_spec(conversation),
            "generationConfig": {
                "maxOutputTokens": params.max_tokens,
                "temperature": params.temperature,
            },
        });
        if let Some(system) = conversation.system() {
            payload["systemInstruction"] = json!({"parts": [{"text": system}]});
        }
        if !tools.is_empty() {
            payload["tools"] = Self::tools_to_google_spec(tools);
        }
        if params.debug {
            debug_dump("req", &payload);
        }

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.host, params.model
        );
        let request = self.authorized(self.client.post(&url)).json(&payload);
        let response = send("google complete", request).await?;
        if params.debug {
            debug_dump("resp", &response);
        }

        let messages = Self::response_to_messages(&response)?;
        Ok((messages, Self::get_usage(&response)))
    }

    async fn list_models(&self) -> Result<Vec<ModelVersion>> {
        let url = format!("{}/v1beta/models", self.host);
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.client.get(&url).query(&[("pageSize", "1000")]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let page = send("google list_models", self.authorized(request)).await?;

            if let Some(entries) = page.get("models").and_then(Value::as_array) {
                for model in entries {
                    let Some(name) = model.get("name").and_then(Value::as_str) else {
                        continue;
                    };
                    let native = name.strip_prefix("models/").unwrap_or(name);
                    let display = model
                        .get("displayName")
                        .and_then(Value::as_str)
                        .unwrap_or(native);
                    models.push(ModelVersion::new(ProviderType::Google, native, display));
                }
            }

            match page.get("nextPageToken").and_then(Value::as_str) {
                Some(token) if !token.is_empty() => page_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::Deserialize;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Deserialize, JsonSchema)]
    struct CatInput {
        /// File to print
        path: String,
    }

    #[derive(Deserialize, JsonSchema)]
    struct NoInput {}

    const MODEL_PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

    async fn setup_mock_server(response_body: Value) -> (MockServer, GoogleProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .and(header("x-goog-api-key", "test_api_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
            .mount(&mock_server)
            .await;

        let settings = ProviderSettings::new("google", "test_api_key").with_host(mock_server.uri());
        let provider = GoogleProvider::new(&settings).unwrap();
        (mock_server, provider)
    }

    fn params() -> ModelParams {
        ModelParams::new("gemini-2.0-flash")
    }

    #[tokio::test]
    async fn test_complete_basic() -> Result<()> {
        let response_body = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "4"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {
                "promptTokenCount": 8,
                "candidatesTokenCount": 1,
                "totalTokenCount": 9
            }
        });

        let (_, provider) = setup_mock_server(response_body).await;
        let conversation = Conversation::from(vec![Message::user("What is 2+2?")]);

        let (messages, usage) = provider.complete(&params(), &conversation, &[]).await?;

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "4");
        assert!(matches!(messages[0].payload(), Some(ProviderPayload::Google(_))));
        assert_eq!(usage, Usage::new(8, 1));
        Ok(())
    }

    #[tokio::test]
    async fn test_function_call_without_id_gets_one() -> Result<()> {
        let response_body = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"functionCall": {"name": "cat", "args": {"path": "a.txt"}}}]
                }
            }]
        });

        let (_, provider) = setup_mock_server(response_body).await;
        let conversation = Conversation::from(vec![Message::user("read a.txt")]);
        let tool = Tool::new("cat", "Print a file", |input: CatInput| input.path);

        let (messages, usage) = provider
            .complete(&params(), &conversation, &[tool])
            .await?;

        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_tool_call());
        assert_eq!(messages[0].tool_name(), Some("cat"));
        assert!(messages[0].tool_id().is_some_and(|id| !id.is_empty()));
        assert_eq!(messages[0].content, r#"{"path":"a.txt"}"#);
        assert_eq!(usage, Usage::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_request_shape() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .and(body_partial_json(json!({
                "systemInstruction": {"parts": [{"text": "Be brief"}]},
                "generationConfig": {"maxOutputTokens": 256},
                "contents": [
                    {"role": "user", "parts": [{"text": "read a.txt"}]},
                    {"role": "model", "parts": [{"functionCall": {"name": "cat", "args": {"path": "a.txt"}}}]},
                    {"role": "user", "parts": [{"functionResponse": {"name": "cat", "response": {"result": "hello"}}}]}
                ],
                "tools": [{"functionDeclarations": [
                    {"name": "cat", "parameters": {"type": "object", "required": ["path"]}},
                    {"name": "now"}
                ]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "It says hello"}]}}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let settings = ProviderSettings::new("google", "k").with_host(mock_server.uri());
        let provider = GoogleProvider::new(&settings)?;
        let call = Message::tool_call("c1", "cat", r#"{"path":"a.txt"}"#);
        let result = Message::tool_result(call.as_tool_call().unwrap(), "hello");
        let conversation = Conversation::from(vec![
            Message::user("read a.txt"),
            call,
            result,
            Message::error("ignored"),
        ])
        .with_system("Be brief");
        let tools = [
            Tool::new("cat", "Print a file", |input: CatInput| input.path),
            Tool::new("now", "Current time", |_: NoInput| "noon".to_string()),
        ];

        let (messages, _) = provider
            .complete(&params().with_max_tokens(256), &conversation, &tools)
            .await?;
        assert_eq!(messages[0].content, "It says hello");

        let declarations = GoogleProvider::tools_to_google_spec(&tools);
        assert!(declarations[0]["functionDeclarations"][1]
            .get("parameters")
            .is_none());
        Ok(())
    }

    #[test]
    fn test_native_part_is_replayed_verbatim() {
        let part = json!({
            "functionCall": {"name": "cat", "args": {"path": "a.txt"}},
            "thoughtSignature": "c2lnbmF0dXJl"
        });
        let call = Message::tool_call("c1", "cat", r#"{"path":"a.txt"}"#)
            .with_payload(ProviderPayload::Google(part.clone()));

        let contents = GoogleProvider::messages_to_google_spec(&Conversation::from(vec![call]));

        assert_eq!(contents[0]["role"], "model");
        assert_eq!(contents[0]["parts"][0], part);
    }

    #[test]
    fn test_call_ids_are_sent_back() {
        let call = Message::tool_call("abc", "cat", r#"{"path":"a.txt"}"#);
        let result = Message::tool_result(call.as_tool_call().unwrap(), "hello");
        let conversation = Conversation::from(vec![Message::user("read a.txt"), call, result]);

        let contents = GoogleProvider::messages_to_google_spec(&conversation);

        assert_eq!(contents[1]["parts"][0]["functionCall"]["id"], "abc");
        assert_eq!(contents[2]["parts"][0]["functionResponse"]["id"], "abc");
        assert_eq!(contents[2]["parts"][0]["functionResponse"]["name"], "cat");
    }

    #[test]
    fn test_generated_call_ids_are_not_sent() {
        let call = Message::tool_call(new_call_id(), "cat", r#"{"path":"a.txt"}"#);
        let result = Message::tool_result(call.as_tool_call().unwrap(), "hello");
        let conversation = Conversation::from(vec![call, result]);

        let contents = GoogleProvider::messages_to_google_spec(&conversation);

        assert!(contents[0]["parts"][0]["functionCall"].get("id").is_none());
        assert!(contents[1]["parts"][0]["functionResponse"].get("id").is_none());
    }

    #[tokio::test]
    async fn test_unknown_part_is_protocol_error() {
        let (_, provider) = setup_mock_server(json!({
            "candidates": [{"content": {"parts": [{"executableCode": {"code": "print(1)"}}]}}]
        }))
        .await;
        let conversation = Conversation::from(vec![Message::user("run it")]);

        let result = provider.complete(&params(), &conversation, &[]).await;
        match result {
            Err(Error::Protocol(message)) => assert!(message.contains("executableCode")),
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_models_paginates() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1beta/models"))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [{"name": "models/gemini-1.5-pro", "displayName": "Gemini 1.5 Pro"}]
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1beta/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [{"name": "models/gemini-2.0-flash", "displayName": "Gemini 2.0 Flash"}],
                "nextPageToken": "page-2"
            })))
            .mount(&mock_server)
            .await;

        let settings = ProviderSettings::new("google", "k").with_host(mock_server.uri());
        let models = GoogleProvider::new(&settings)?.list_models().await?;

        assert_eq!(
            models,
            vec![
                ModelVersion::new(ProviderType::Google, "gemini-2.0-flash", "Gemini 2.0 Flash"),
                ModelVersion::new(ProviderType::Google, "gemini-1.5-pro", "Gemini 1.5 Pro"),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_list_models_page_failure_is_reported() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1beta/models"))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1beta/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [{"name": "models/gemini-2.0-flash"}],
                "nextPageToken": "page-2"
            })))
            .mount(&mock_server)
            .await;

        let settings = ProviderSettings::new("google", "k").with_host(mock_server.uri());
        let result = GoogleProvider::new(&settings).unwrap().list_models().await;

        assert!(matches!(result, Err(Error::Transport { .. })));
    }
}
