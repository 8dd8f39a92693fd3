use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use super::factory::ProviderType;
use crate::errors::Result;
use crate::models::conversation::Conversation;
use crate::models::message::Message;
use crate::tool::Tool;

/// Token counters reported by a backend for one or more calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }
}

impl Add for Usage {
    type Output = Usage;

    fn add(self, other: Usage) -> Usage {
        Usage {
            input_tokens: self.input_tokens + other.input_tokens,
            output_tokens: self.output_tokens + other.output_tokens,
        }
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, other: Usage) {
        *self = *self + other;
    }
}

impl Sum for Usage {
    fn sum<I: Iterator<Item = Usage>>(iter: I) -> Usage {
        iter.fold(Usage::default(), Add::add)
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Input tokens: {}, Output tokens: {}",
            self.input_tokens, self.output_tokens
        )
    }
}

/// A model offered by a backend, as reported by [`Provider::list_models`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelVersion {
    /// `<provider>/<native id>`
    pub id: String,
    pub name: String,
}

impl ModelVersion {
    pub fn new<N: Into<String>>(provider: ProviderType, native_id: &str, name: N) -> Self {
        Self {
            id: format!("{}/{}", provider, native_id),
            name: name.into(),
        }
    }
}

/// Per-call model parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    /// The backend's own model id
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Dump every request and response payload to the debug directory
    #[serde(default)]
    pub debug: bool,
}

impl ModelParams {
    pub const DEFAULT_MAX_TOKENS: u32 = 1024;
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;

    pub fn new<S: Into<String>>(model: S) -> Self {
        Self {
            model: model.into(),
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            temperature: Self::DEFAULT_TEMPERATURE,
            debug: false,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// Base trait for AI providers (OpenAI, Anthropic, etc)
#[async_trait]
pub trait Provider: Send + Sync {
    /// Which backend this provider talks to
    fn kind(&self) -> ProviderType;

    /// Send the conversation and the available tools, returning one message per
    /// content unit of the reply and the usage the backend reported
    async fn complete(
        &self,
        params: &ModelParams,
        conversation: &Conversation,
        tools: &[Tool],
    ) -> Result<(Vec<Message>, Usage)>;

    /// List the models this backend offers
    async fn list_models(&self) -> Result<Vec<ModelVersion>>;
}
