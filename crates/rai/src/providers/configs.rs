use serde::{Deserialize, Serialize};
use std::fmt;

/// Everything needed to build a provider: which backend, how to authenticate,
/// and optionally where it lives
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Registry key of the backend, e.g. `anthropic`
    pub kind: String,
    /// Opaque credential; empty for backends that need none
    #[serde(default)]
    pub api_key: String,
    /// Base URL override, mostly for proxies and tests
    #[serde(default)]
    pub host: Option<String>,
}

impl ProviderSettings {
    pub fn new<K: Into<String>, A: Into<String>>(kind: K, api_key: A) -> Self {
        Self {
            kind: kind.into(),
            api_key: api_key.into(),
            host: None,
        }
    }

    pub fn with_host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = Some(host.into());
        self
    }

    /// The configured host, or `default`, without a trailing slash
    pub fn host_or(&self, default: &str) -> String {
        self.host
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("kind", &self.kind)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("host", &self.host)
            .finish()
    }
}
