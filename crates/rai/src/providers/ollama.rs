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

pub const OLLAMA_HOST: &str = "http://localhost:11434";

/// A local ollama server through its openai compatible endpoint. No credential is sent.
pub struct OllamaProvider {
    client: Client,
    host: String,
}

impl OllamaProvider {
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        // Accept hosts written with or without the `/v1` suffix
        let host = settings.host_or(OLLAMA_HOST);
        let host = host.strip_suffix("/v1").unwrap_or(&host).to_string();

        Ok(Self {
            client: build_client()?,
            host,
        })
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn kind(&self) -> ProviderType {
        ProviderType::Ollama
    }

    async fn complete(
        &self,
        params: &ModelParams,
        conversation: &Conversation,
        tools: &[Tool],
    ) -> Result<(Vec<Message>, Usage)> {
        let payload = openai_chat_payload(params, conversation, tools, ProviderType::Ollama, true);
        if params.debug {
            debug_dump("req", &payload);
        }

        let url = format!("{}/v1/chat/completions", self.host);
        let response = send("ollama complete", self.client.post(&url).json(&payload)).await?;
        if params.debug {
            debug_dump("resp", &response);
        }

        check_openai_error(&response, "ollama complete")?;
        let messages = openai_response_to_messages(&response, ProviderType::Ollama)?;
        Ok((messages, openai_usage(&response)))
    }

    async fn list_models(&self) -> Result<Vec<ModelVersion>> {
        let url = format!("{}/api/tags", self.host);
        let response = send("ollama list_models", self.client.get(&url)).await?;

        let models = response
            .get("models")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::transport("ollama list_models", "response has no models"))?;

        Ok(models
            .iter()
            .filter_map(|model| model.get("name").and_then(Value::as_str))
            .map(|name| ModelVersion::new(ProviderType::Ollama, name, name))
            .collect())
    }
}
