//! These models represent the objects passed between the agent and the providers
//!
//! Every backend speaks its own dialect (anthropic content blocks, openai chat
//! messages with tool_calls, gemini parts). The agent only ever sees the normalized
//! models below; each provider converts to and from its wire format at the edge.
//! When a backend returns something it cannot rebuild from plain text, the original
//! unit is kept on the message as a [`message::ProviderPayload`].
pub mod conversation;
pub mod message;
pub mod role;
