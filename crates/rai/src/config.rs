use config::{Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::errors::{Error, Result};
use crate::providers::base::ModelParams;
use crate::providers::configs::ProviderSettings;

/// A backend account from the configuration file
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProviderEntry {
    #[serde(default)]
    pub name: String,
    /// Registry key of the backend; defaults to the name
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub host: Option<String>,
}

impl ProviderEntry {
    pub fn settings(&self) -> ProviderSettings {
        ProviderSettings {
            kind: self.kind.clone(),
            api_key: self.key.clone(),
            host: self.host.clone(),
        }
    }
}

/// A named model on one of the configured providers
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    pub provider: String,
    /// The backend's own model id
    pub model: String,
    #[serde(default)]
    pub max_token: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub default: bool,
}

/// Per-invocation values that win over the configured ones
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelOverrides {
    /// Send the request through this configured provider instead of the model's own
    pub provider: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub debug: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
    #[serde(default)]
    pub models: Vec<ModelEntry>,
    /// Name of the model used when none is requested; wins over `default: true` entries
    #[serde(default)]
    pub default_model: Option<String>,
}

impl Config {
    /// `~/.config/rai/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config").join("rai").join("config.yaml"))
    }

    /// Load a YAML file, then layer `RAI_` environment variables on top
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!("Loading configuration from {}", path.display());
        let source = File::from(path).format(FileFormat::Yaml).required(true);
        Self::build(source).map_err(|e| {
            Error::config(format!(
                "Could not load configuration from {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Parse YAML text, then layer `RAI_` environment variables on top
    pub fn parse(yaml: &str) -> Result<Self> {
        Self::build(File::from_str(yaml, FileFormat::Yaml))
            .map_err(|e| Error::config(format!("Could not parse configuration: {}", e)))
    }

    fn build<S>(source: S) -> std::result::Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config: Config = config::Config::builder()
            .add_source(source)
            .add_source(
                Environment::with_prefix("RAI")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config.normalized())
    }

    /// Provider name and type fall back to each other
    fn normalized(mut self) -> Self {
        for provider in &mut self.providers {
            if provider.kind.is_empty() {
                provider.kind = provider.name.clone();
            }
            if provider.name.is_empty() {
                provider.name = provider.kind.clone();
            }
        }
        self
    }

    pub fn find_provider(&self, name: &str) -> Option<&ProviderEntry> {
        self.providers.iter().find(|p| p.name == name)
    }

    pub fn find_model(&self, name: &str) -> Option<&ModelEntry> {
        self.models.iter().find(|m| m.name == name)
    }

    pub fn find_default_model(&self) -> Option<&ModelEntry> {
        match &self.default_model {
            Some(name) if !name.is_empty() => self.find_model(name),
            _ => self.models.iter().find(|m| m.default),
        }
    }

    /// Turn a requested model into provider settings and call parameters.
    ///
    /// No name picks the default model. A configured model name picks that model.
    /// Anything else is read as `<provider>/<model id>`.
    pub fn resolve(
        &self,
        requested: Option<&str>,
        overrides: &ModelOverrides,
    ) -> Result<(ProviderSettings, ModelParams)> {
        let model = match requested.map(str::trim).filter(|r| !r.is_empty()) {
            None => self
                .find_default_model()
                .cloned()
                .ok_or_else(|| Error::config("No model requested and no default model configured"))?,
            Some(name) => match self.find_model(name) {
                Some(model) => model.clone(),
                None => {
                    let (provider, model) = name
                        .split_once('/')
                        .filter(|(p, m)| !p.is_empty() && !m.is_empty())
                        .ok_or_else(|| {
                            Error::config(format!(
                                "Unknown model '{}' (expected a configured name or <provider>/<model>)",
                                name
                            ))
                        })?;
                    ModelEntry {
                        name: name.to_string(),
                        provider: provider.to_string(),
                        model: model.to_string(),
                        max_token: None,
                        temperature: None,
                        debug: false,
                        default: false,
                    }
                }
            },
        };

        let provider_name = overrides
            .provider
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(&model.provider);
        let provider = self.find_provider(provider_name).ok_or_else(|| {
            Error::config(format!(
                "Model '{}' refers to unknown provider '{}'",
                model.name, provider_name
            ))
        })?;

        let params = ModelParams::new(model.model)
            .with_max_tokens(
                overrides
                    .max_tokens
                    .or(model.max_token)
                    .unwrap_or(ModelParams::DEFAULT_MAX_TOKENS),
            )
            .with_temperature(
                overrides
                    .temperature
                    .or(model.temperature)
                    .unwrap_or(ModelParams::DEFAULT_TEMPERATURE),
            )
            .with_debug(model.debug || overrides.debug);

        Ok((provider.settings(), params))
    }
}
