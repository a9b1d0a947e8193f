//! CLI command definitions.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a pipeline YAML file without submitting it.
    Validate {
        /// Path to the pipeline file.
        #[arg(default_value = "kiln.yaml")]
        path: PathBuf,
    },

    /// Submit a pipeline YAML file for execution.
    Run {
        /// Path to the pipeline file.
        #[arg(default_value = "kiln.yaml")]
        path: PathBuf,
    },

    /// List pipelines submitted by the configured client id.
    Pipelines,

    /// Look up stage status for one or more pipeline ids.
    Stages {
        /// Pipeline ids to look up.
        #[arg(required = true)]
        pipeline_ids: Vec<String>,
    },

    /// Manage local CLI configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration.
    Show,

    /// Set a configuration value.
    Set {
        /// Key: `api_url` or `client_id`.
        key: String,
        /// Value.
        value: String,
    },
}
