use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::base::{ModelParams, ModelVersion, Provider, Usage};
use super::factory::ProviderType;
use crate::errors::{Error, Result};
use crate::models::conversation::Conversation;
use crate::models::message::Message;
use crate::tool::Tool;

type Reply = Result<(Vec<Message>, Usage)>;

/// A mock provider that returns pre-configured responses for testing
pub struct MockProvider {
    responses: Arc<Mutex<Vec<Reply>>>,
    requests: Arc<Mutex<Vec<Conversation>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Vec<Message>>) -> Self {
        Self::with_usage(
            responses
                .into_iter()
                .map(|messages| (messages, Usage::default()))
                .collect(),
        )
    }

    pub fn with_usage(responses: Vec<(Vec<Message>, Usage)>) -> Self {
        Self::with_replies(responses.into_iter().map(Ok).collect())
    }

    pub fn with_replies(replies: Vec<Reply>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(replies)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A handle to the conversations this provider has been called with
    pub fn requests(&self) -> Arc<Mutex<Vec<Conversation>>> {
        Arc::clone(&self.requests)
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn kind(&self) -> ProviderType {
        ProviderType::OpenAi
    }

    async fn complete(
        &self,
        _params: &ModelParams,
        conversation: &Conversation,
        _tools: &[Tool],
    ) -> Result<(Vec<Message>, Usage)> {
        self.requests.lock().unwrap().push(conversation.clone());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            // Return empty response if no more pre-configured responses
            Ok((vec![Message::assistant("")], Usage::default()))
        } else {
            responses.remove(0)
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelVersion>> {
        Err(Error::transport("mock list_models", "not supported"))
    }
}
