use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rai::config::Config;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod commands;
mod tools;

use commands::ask::AskArgs;
use commands::prompt::DoArgs;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ~/.config/rai/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send one message to a model and print the answer
    Ask(AskArgs),

    /// Run a prompt template saved next to the configuration file
    Do(DoArgs),

    /// List the models offered by every configured provider
    List,
}

fn config_path(path: Option<PathBuf>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path),
        None => Config::default_path().context("Could not determine the home directory"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let path = config_path(cli.config)?;
    let config = Config::load(&path)?;

    match cli.command {
        Command::Ask(args) => commands::ask::execute(&config, args).await,
        Command::Do(args) => {
            let prompt_dir = path.parent().unwrap_or(Path::new("."));
            commands::prompt::execute(&config, prompt_dir, args).await
        }
        Command::List => commands::list::execute(&config).await,
    }
}
