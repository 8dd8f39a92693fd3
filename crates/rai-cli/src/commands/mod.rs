use anyhow::Result;
use clap::Args;
use console::style;
use rai::config::ModelOverrides;
use rai::{Agent, Conversation, Message, Role};
use tokio_util::sync::CancellationToken;

pub mod ask;
pub mod list;
pub mod prompt;

/// Model selection flags shared by the commands that talk to a model
#[derive(Args, Debug, Default)]
pub struct ModelArgs {
    /// Configured model name, or <provider>/<model>
    #[arg(short, long)]
    pub model: Option<String>,

    /// Send the request through this configured provider instead of the model's own
    #[arg(long)]
    pub provider: Option<String>,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    #[arg(long)]
    pub temperature: Option<f32>,

    /// Dump request and response payloads to the debug directory
    #[arg(long)]
    pub debug: bool,
}

impl ModelArgs {
    pub fn overrides(&self) -> ModelOverrides {
        ModelOverrides {
            provider: self.provider.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            debug: self.debug,
        }
    }
}

/// Run the agent until it answers, print the answer, and report usage on stderr.
///
/// Ctrl-C cancels the run.
pub async fn converse(agent: &Agent, conversation: &mut Conversation) -> Result<()> {
    let asked = conversation.len();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let result = agent.run(conversation, &cancel).await;

    for text in answer_texts(&conversation.messages()[asked..]) {
        println!("{}", text);
    }

    match result {
        Ok(usage) => {
            eprintln!("{}", style(usage).dim());
            Ok(())
        }
        Err(err) => {
            eprintln!("{}", style(err.usage).dim());
            Err(err.into())
        }
    }
}

/// The assistant prose among `messages`, skipping tool traffic and empty replies
fn answer_texts(messages: &[Message]) -> Vec<&str> {
    messages
        .iter()
        .filter(|m| m.role == Role::Assistant && !m.is_tool_call())
        .map(|m| m.content.as_str())
        .filter(|text| !text.trim().is_empty())
        .collect()
}
