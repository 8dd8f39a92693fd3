use anyhow::{Context, Result};
use rai::config::Config;
use rai::{ProviderFactory, ProviderRegistry};

pub async fn execute(config: &Config) -> Result<()> {
    let registry = ProviderRegistry::with_defaults();

    for entry in &config.providers {
        let provider = registry
            .create(&entry.settings())
            .with_context(|| format!("Could not set up provider {}", entry.name))?;
        let models = provider
            .list_models()
            .await
            .with_context(|| format!("Could not list the models of {}", entry.name))?;

        for model in models {
            println!("{} {}", model.id, model.name);
        }
    }

    Ok(())
}
