use anyhow::{Context as _, Result};
use clap::Args;
use rai::config::Config;
use rai::{Agent, Conversation, Message, ProviderRegistry, ToolRegistry};
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};

use super::{converse, ModelArgs};

#[derive(Args, Debug)]
pub struct DoArgs {
    /// Name of a prompt template in the configuration directory
    pub command: String,

    /// File whose content the template can use as {{ file }}
    #[arg(long)]
    pub file: Option<PathBuf>,

    #[command(flatten)]
    pub model: ModelArgs,
}

/// Run a saved prompt: `<dir>/<command>` is the template, `<dir>/<command>.system`
/// the optional system prompt
pub async fn execute(config: &Config, prompt_dir: &Path, args: DoArgs) -> Result<()> {
    let mut conversation = load_prompt(prompt_dir, &args.command, args.file.as_deref())?;

    let (settings, params) =
        config.resolve(args.model.model.as_deref(), &args.model.overrides())?;
    let agent = Agent::from_factory(
        &ProviderRegistry::with_defaults(),
        &settings,
        params,
        ToolRegistry::default(),
    )?;

    converse(&agent, &mut conversation).await
}

fn load_prompt(prompt_dir: &Path, command: &str, file: Option<&Path>) -> Result<Conversation> {
    if command.is_empty() || command.contains(&['/', '\\'][..]) || command.starts_with('.') {
        anyhow::bail!("Invalid command name '{}'", command);
    }

    let template_path = prompt_dir.join(command);
    let template = fs::read_to_string(&template_path).with_context(|| {
        format!("Could not read prompt template {}", template_path.display())
    })?;

    let file_content = match file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?,
        None => String::new(),
    };
    let prompt = render(&template, &file_content)
        .with_context(|| format!("Could not render prompt template {}", template_path.display()))?;

    let system_path = prompt_dir.join(format!("{}.system", command));
    let system = if system_path.exists() {
        fs::read_to_string(&system_path)
            .with_context(|| format!("Could not read {}", system_path.display()))?
    } else {
        String::new()
    };

    let mut conversation = Conversation::new().with_system(system);
    conversation.push(Message::user(prompt));
    Ok(conversation)
}

fn render(template: &str, file: &str) -> tera::Result<String> {
    let mut tera = Tera::default();
    tera.add_raw_template("prompt", template)?;
    let mut context = Context::new();
    context.insert("file", file);
    tera.render("prompt", &context)
}
