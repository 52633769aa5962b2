//! Config command - show the effective configuration

use autocr_core::ConfigOverrides;
use clap::Args;

use super::Context;

/// Show the effective configuration
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Print as JSON instead of TOML
    #[arg(long)]
    json: bool,
}

impl ConfigArgs {
    /// Execute the config command
    pub fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let repo = ctx.open_repo()?;
        let store = ctx.store(&repo, ConfigOverrides::default());
        let config = store
            .current()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&config)?);
            return Ok(());
        }

        println!("autocr configuration");
        println!("====================");
        println!();
        match store.config_path() {
            Some(path) => println!("Config file: {}", path.display()),
            None => println!("Config file: (none - using defaults)"),
        }
        println!("Repository: {}", repo.root().display());
        println!();
        print!("{}", toml::to_string_pretty(&config)?);

        Ok(())
    }
}
