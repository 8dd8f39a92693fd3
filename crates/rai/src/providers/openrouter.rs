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

pub const OPENROUTER_HOST: &str = "https://openrouter.ai/api/v1";

/// OpenRouter speaks the openai chat completion dialect, but reports some
/// failures as an `error` object inside a successful response
pub struct OpenRouterProvider {
    client: Client,
    host: String,
    api_key: String,
}

impl OpenRouterProvider {
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            host: settings.host_or(OPENROUTER_HOST),
            api_key: settings.api_key.clone(),
        })
    }
}

#[async_trait]
impl Provider for OpenRouterProvider {
    fn kind(&self) -> ProviderType {
        ProviderType::OpenRouter
    }

    async fn complete(
        &self,
        params: &ModelParams,
        conversation: &Conversation,
        tools: &[Tool],
    ) -> Result<(Vec<Message>, Usage)> {
        let payload =
            openai_chat_payload(params, conversation, tools, ProviderType::OpenRouter, true);
        if params.debug {
            debug_dump("req", &payload);
        }

        let url = format!("{}/chat/completions", self.host);
        let request = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload);
        let response = send("openrouter complete", request).await?;
        if params.debug {
            debug_dump("resp", &response);
        }

        check_openai_error(&response, "openrouter complete")?;
        let messages = openai_response_to_messages(&response, ProviderType::OpenRouter)?;
        Ok((messages, openai_usage(&response)))
    }

    async fn list_models(&self) -> Result<Vec<ModelVersion>> {
        let url = format!("{}/models", self.host);
        let request = self.client.get(&url).bearer_auth(&self.api_key);
        let response = send("openrouter list_models", request).await?;

        let data = response
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::transport("openrouter list_models", "response has no data"))?;

        Ok(data
            .iter()
            .filter_map(|model| {
                let id = model.get("id").and_then(Value::as_str)?;
                let name = model.get("name").and_then(Value::as_str).unwrap_or(id);
                Some(ModelVersion::new(ProviderType::OpenRouter, id, name))
            })
            .collect())
    }
}
