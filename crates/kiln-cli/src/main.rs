//! Kiln CLI entrypoint: uploads pipeline descriptors to a running scheduler.

use clap::Parser;

mod client;
mod commands;
mod config;
mod handlers;
mod yaml;

use commands::{Commands, ConfigCommands};
use config::CliConfig;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about = "Kiln CI command-line interface", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = CliConfig::load().unwrap_or_default();

    match cli.command {
        Commands::Validate { path } => handlers::validate(&path).await?,
        Commands::Run { path } => handlers::run_pipeline(&config, &path).await?,
        Commands::Pipelines => handlers::list_pipelines(&config).await?,
        Commands::Stages { pipeline_ids } => handlers::show_stages(&config, pipeline_ids).await?,
        Commands::Config { command } => match command {
            ConfigCommands::Show => handlers::show_config(&config)?,
            ConfigCommands::Set { key, value } => handlers::set_config(&key, &value)?,
        },
    }

    Ok(())
}
