use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::base::{ModelParams, ModelVersion, Provider, Usage};
use super::configs::ProviderSettings;
use super::factory::ProviderType;
use super::utils::{
    build_client, check_openai_error, debug_dump, openai_chat_payload,
    openai_response_to_messages, openai_usage, send,
};
use crate::errors::{Error, Result};
use crate::models::conversation::Conversation;
use crate::models::message::Message;
use crate::tool::Tool;

pub const OPENAI_HOST: &str = "https://api.openai.com";

pub struct OpenAiProvider {
    client: Client,
    host: String,
    api_key: String,
}

impl OpenAiProvider {
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            host: settings.host_or(OPENAI_HOST),
            api_key: settings.api_key.clone(),
        })
    }

    async fn post(&self, payload: &Value) -> Result<Value> {
        let url = format!("{}/v1/chat/completions", self.host);
        let request = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(payload);
        send("openai complete", request).await
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn kind(&self) -> ProviderType {
        ProviderType::OpenAi
    }

    async fn complete(
        &self,
        params: &ModelParams,
        conversation: &Conversation,
        tools: &[Tool],
    ) -> Result<(Vec<Message>, Usage)> {
        let payload = openai_chat_payload(params, conversation, tools, ProviderType::OpenAi, true);
        if params.debug {
            debug_dump("req", &payload);
        }

        let response = self.post(&payload).await?;
        if params.debug {
            debug_dump("resp", &response);
        }

        check_openai_error(&response, "openai complete")?;
        let messages = openai_response_to_messages(&response, ProviderType::OpenAi)?;
        Ok((messages, openai_usage(&response)))
    }

    async fn list_models(&self) -> Result<Vec<ModelVersion>> {
        let url = format!("{}/v1/models", self.host);
        let request = self.client.get(&url).bearer_auth(&self.api_key);
        let response = send("openai list_models", request).await?;

        let data = response
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::transport("openai list_models", "response has no data"))?;

        Ok(data
            .iter()
            .filter_map(|model| model.get("id").and_then(Value::as_str))
            .map(|id| ModelVersion::new(ProviderType::OpenAi, id, id))
            .collect())
    }
}
