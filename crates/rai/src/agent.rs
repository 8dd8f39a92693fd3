use tokio_util::sync::CancellationToken;

use crate::errors::{AgentError, Error, Result};
use crate::models::conversation::Conversation;
use crate::models::message::{Message, ToolCallRef};
use crate::providers::base::{ModelParams, Provider, Usage};
use crate::providers::configs::ProviderSettings;
use crate::providers::factory::ProviderFactory;
use crate::tool::ToolRegistry;

/// What to do when the model asks for a tool that is not registered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownToolPolicy {
    /// Leave the call unanswered
    #[default]
    Skip,
    /// Answer the call with an error result
    Report,
}

/// Agent drives one provider and a fixed set of tools until the model stops asking for tools
pub struct Agent {
    provider: Box<dyn Provider>,
    params: ModelParams,
    tools: ToolRegistry,
    max_rounds: usize,
    unknown_tool: UnknownToolPolicy,
}

impl Agent {
    pub const DEFAULT_MAX_ROUNDS: usize = 25;

    pub fn new(provider: Box<dyn Provider>, params: ModelParams, tools: ToolRegistry) -> Self {
        Self {
            provider,
            params,
            tools,
            max_rounds: Self::DEFAULT_MAX_ROUNDS,
            unknown_tool: UnknownToolPolicy::default(),
        }
    }

    /// Build the provider through `factory` and wrap it
    pub fn from_factory(
        factory: &dyn ProviderFactory,
        settings: &ProviderSettings,
        params: ModelParams,
        tools: ToolRegistry,
    ) -> Result<Self> {
        let provider = factory.create(settings)?;
        Ok(Self::new(provider, params, tools))
    }

    /// Cap the number of provider calls in one run; at least one call is always made
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    pub fn with_unknown_tool_policy(mut self, policy: UnknownToolPolicy) -> Self {
        self.unknown_tool = policy;
        self
    }

    /// Run the conversation until the model answers without tool calls.
    ///
    /// Every message the provider returns and every tool result is appended to
    /// `conversation`, which keeps them even when the run fails.
    pub async fn run(
        &self,
        conversation: &mut Conversation,
        cancel: &CancellationToken,
    ) -> std::result::Result<Usage, AgentError> {
        let mut usage = Usage::default();
        let mut rounds = 0;

        match self
            .drive(conversation, cancel, &mut usage, &mut rounds)
            .await
        {
            Ok(()) => {
                tracing::debug!(rounds, %usage, "conversation finished");
                Ok(usage)
            }
            Err(source) => {
                tracing::debug!(rounds, %usage, error = %source, "conversation failed");
                Err(AgentError {
                    usage,
                    rounds,
                    source,
                })
            }
        }
    }

    async fn drive(
        &self,
        conversation: &mut Conversation,
        cancel: &CancellationToken,
        usage: &mut Usage,
        rounds: &mut usize,
    ) -> Result<()> {
        loop {
            *rounds += 1;
            tracing::debug!(
                round = *rounds,
                provider = %self.provider.kind(),
                messages = conversation.len(),
                "invoking provider"
            );

            let (reply, reply_usage) = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                result = self.provider.complete(&self.params, conversation, self.tools.tools()) => result?,
            };
            *usage += reply_usage;

            let calls: Vec<(ToolCallRef, String)> = reply
                .iter()
                .filter_map(|m| m.as_tool_call().map(|call| (call.clone(), m.content.clone())))
                .collect();
            conversation.append(reply);

            if calls.is_empty() {
                return Ok(());
            }
            if *rounds >= self.max_rounds {
                return Err(Error::RoundLimitExceeded(self.max_rounds));
            }

            tracing::debug!(round = *rounds, calls = calls.len(), "executing tool calls");
            for (call, arguments) in calls {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                self.execute(conversation, &call, &arguments)?;
            }
        }
    }

    fn execute(
        &self,
        conversation: &mut Conversation,
        call: &ToolCallRef,
        arguments: &str,
    ) -> Result<()> {
        match self.tools.resolve(&call.name) {
            Some(tool) => {
                tracing::info!(tool = %call.name, id = %call.id, "running tool");
                let output = tool.call(arguments)?;
                conversation.push(Message::tool_result(call, output));
            }
            None => match self.unknown_tool {
                UnknownToolPolicy::Skip => {
                    tracing::warn!(tool = %call.name, "model requested an unknown tool, skipping");
                }
                UnknownToolPolicy::Report => {
                    tracing::warn!(tool = %call.name, "model requested an unknown tool, reporting");
                    conversation.push(Message::tool_result(
                        call,
                        format!("Error: unknown tool {}", call.name),
                    ));
                }
            },
        }
        Ok(())
    }
}
