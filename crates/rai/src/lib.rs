pub mod agent;
pub mod config;
pub mod errors;
pub mod models;
pub mod providers;
pub mod tool;

pub use agent::{Agent, UnknownToolPolicy};
pub use errors::{AgentError, Error, Result};
pub use models::conversation::Conversation;
pub use models::message::{Message, ProviderPayload, ToolCallRef};
pub use models::role::Role;
pub use providers::base::{ModelParams, ModelVersion, Provider, Usage};
pub use providers::configs::ProviderSettings;
pub use providers::factory::{ProviderFactory, ProviderRegistry, ProviderType};
pub use tool::{Tool, ToolRegistry};
