use anyhow::Context;
use clap::{Parser, Subcommand};
use dreval_core::{Config, Evaluator};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dreval", version, about = "Checkpointed batch evaluation harness")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an evaluation described by a YAML configuration.
    Run {
        /// Path to the configuration file.
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Parse a configuration and print the resolved settings without
    /// running anything.
    Check {
        /// Path to the configuration file.
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env("DREVAL_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run { config } => {
            let config = Config::from_yaml_file(&config)?;
            let registry = dreval_modules::builtin_registry();
            let evaluator = Evaluator::from_config(config, &registry)?;
            let summary = evaluator.eval().await?;
            if !summary.is_null() {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
        }
        Command::Check { config } => {
            let parsed = Config::from_yaml_file(&config)?;
            // Resolving bindings surfaces unknown module names up front.
            let registry = dreval_modules::builtin_registry();
            dreval_core::Modules::resolve(&registry, &parsed.modules)
                .context("module bindings did not resolve")?;
            println!("{}", serde_json::to_string_pretty(&parsed)?);
        }
    }
    Ok(())
}
