use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use super::{
    anthropic::AnthropicProvider, base::Provider, configs::ProviderSettings,
    google::GoogleProvider, ollama::OllamaProvider, openai::OpenAiProvider,
    openrouter::OpenRouterProvider,
};
use crate::errors::{Error, Result};

#[derive(EnumIter, EnumString, Display, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Anthropic,
    OpenAi,
    OpenRouter,
    Google,
    Ollama,
}

/// Builds a provider for a settings block
pub type ProviderConstructor =
    Arc<dyn Fn(&ProviderSettings) -> Result<Box<dyn Provider>> + Send + Sync>;

/// Turns provider settings into a live provider
pub trait ProviderFactory: Send + Sync {
    fn create(&self, settings: &ProviderSettings) -> Result<Box<dyn Provider>>;
}

/// A string-keyed table of provider constructors.
///
/// The table is an ordinary value: build one, register what you need, and hand it
/// to whoever creates agents.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    constructors: HashMap<String, ProviderConstructor>,
}

impl ProviderRegistry {
    /// A registry with no providers at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry with every built-in backend under its lowercase name
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for provider_type in ProviderType::iter() {
            registry.register(provider_type.to_string(), move |settings| {
                build_builtin(provider_type, settings)
            });
        }
        registry
    }

    pub fn register<K, F>(&mut self, kind: K, constructor: F) -> &mut Self
    where
        K: Into<String>,
        F: Fn(&ProviderSettings) -> Result<Box<dyn Provider>> + Send + Sync + 'static,
    {
        self.constructors.insert(kind.into(), Arc::new(constructor));
        self
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }
}

impl ProviderFactory for ProviderRegistry {
    fn create(&self, settings: &ProviderSettings) -> Result<Box<dyn Provider>> {
        let constructor = self.constructors.get(&settings.kind).ok_or_else(|| {
            Error::config(format!(
                "Unknown provider type '{}' (known: {})",
                settings.kind,
                self.kinds().join(", ")
            ))
        })?;
        constructor(settings)
    }
}

fn build_builtin(provider_type: ProviderType, settings: &ProviderSettings) -> Result<Box<dyn Provider>> {
    match provider_type {
        ProviderType::Anthropic => Ok(Box::new(AnthropicProvider::new(settings)?)),
        ProviderType::OpenAi => Ok(Box::new(OpenAiProvider::new(settings)?)),
        ProviderType::OpenRouter => Ok(Box::new(OpenRouterProvider::new(settings)?)),
        ProviderType::Google => Ok(Box::new(GoogleProvider::new(settings)?)),
        ProviderType::Ollama => Ok(Box::new(OllamaProvider::new(settings)?)),
    }
}

/// Build a provider from the built-in backends
pub fn get_provider(settings: &ProviderSettings) -> Result<Box<dyn Provider>> {
    ProviderRegistry::with_defaults().create(settings)
}
