use anyhow::Result;
use clap::Args;
use rai::config::Config;
use rai::{Agent, Conversation, Message, ProviderRegistry, ToolRegistry, UnknownToolPolicy};

use super::{converse, ModelArgs};
use crate::tools;

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Message to send
    pub message: String,

    #[command(flatten)]
    pub model: ModelArgs,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Let the model read local files with the cat and files tools
    #[arg(long)]
    pub tools: bool,

    /// Give up when the model still wants tools after this many calls
    #[arg(long, default_value_t = Agent::DEFAULT_MAX_ROUNDS)]
    pub max_rounds: usize,

    /// Answer unknown tool requests with an error instead of ignoring them
    #[arg(long)]
    pub report_unknown_tools: bool,
}

pub async fn execute(config: &Config, args: AskArgs) -> Result<()> {
    let (settings, params) =
        config.resolve(args.model.model.as_deref(), &args.model.overrides())?;
    tracing::debug!(provider = %settings.kind, model = %params.model, "resolved model");

    let tools = if args.tools {
        tools::builtin()
    } else {
        Vec::new()
    };
    let policy = if args.report_unknown_tools {
        UnknownToolPolicy::Report
    } else {
        UnknownToolPolicy::Skip
    };
    let agent = Agent::from_factory(
        &ProviderRegistry::with_defaults(),
        &settings,
        params,
        ToolRegistry::new(tools)?,
    )?
    .with_max_rounds(args.max_rounds)
    .with_unknown_tool_policy(policy);

    let mut conversation = Conversation::new().with_system(args.system.unwrap_or_default());
    conversation.push(Message::user(args.message));

    converse(&agent, &mut conversation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        ask: AskArgs,
    }

    #[test]
    fn test_args_defaults() {
        let parsed = Harness::parse_from(["rai", "What is 2+2?"]);
        assert_eq!(parsed.ask.message, "What is 2+2?");
        assert_eq!(parsed.ask.max_rounds, Agent::DEFAULT_MAX_ROUNDS);
        assert!(!parsed.ask.tools);
        assert!(parsed.ask.model.model.is_none());
        assert!(parsed.ask.model.provider.is_none());
    }

    #[test]
    fn test_args_flags() {
        let parsed = Harness::parse_from([
            "rai",
            "-m",
            "sonnet",
            "--provider",
            "work",
            "--tools",
            "--debug",
            "hi",
        ]);
        assert_eq!(parsed.ask.model.model.as_deref(), Some("sonnet"));
        assert_eq!(parsed.ask.model.provider.as_deref(), Some("work"));
        assert!(parsed.ask.tools);
        assert!(parsed.ask.model.debug);
    }
}
