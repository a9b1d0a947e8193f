//! Command handlers.

use crate::client::ApiClient;
use crate::config::CliConfig;
use crate::yaml::YamlPipeline;
use console::style;
use kiln_core::pipeline::PipelineDescriptor;
use std::path::Path;

/// Parse a YAML pipeline file and validate it against the same shape checks
/// the scheduler applies before accepting a run.
pub async fn validate(path: &Path) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let descriptor = load_descriptor(path)?;
    descriptor
        .validate()
        .map_err(|e| format!("invalid pipeline: {e}"))?;

    println!(
        "{} pipeline \"{}\" is valid",
        style("✓").green(),
        descriptor.image
    );
    println!("  stages: {}", descriptor.stages.len());
    for (name, stage) in &descriptor.stages {
        println!("    - {} ({} commands)", name, stage.script.len());
    }
    Ok(())
}

/// Submit a pipeline YAML file to the configured API server.
pub async fn run_pipeline(
    config: &CliConfig,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let descriptor = load_descriptor(path)?;
    descriptor
        .validate()
        .map_err(|e| format!("invalid pipeline: {e}"))?;

    let client = ApiClient::new(config);
    client.execute(&descriptor).await?;

    println!("{} pipeline accepted", style("✓").green());
    println!("  api_url: {}", config.api_url);
    println!("  client_id: {}", config.client_id);
    Ok(())
}

/// List pipelines owned by the configured client id.
pub async fn list_pipelines(
    config: &CliConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let client = ApiClient::new(config);
    let ids = client.list_pipelines().await?;

    if ids.is_empty() {
        println!("{} no pipelines found", style("i").blue());
        return Ok(());
    }
    for id in ids {
        println!("{id}");
    }
    Ok(())
}

/// Look up stage status for a set of pipeline ids.
pub async fn show_stages(
    config: &CliConfig,
    pipeline_ids: Vec<String>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let client = ApiClient::new(config);

    if let [single] = pipeline_ids.as_slice() {
        let stages = client.get_pipeline_stages(single).await?;
        print_stage_rows(single, &stages);
        return Ok(());
    }

    let results = client.bulk_stage_lookup(&pipeline_ids).await?;
    for id in &pipeline_ids {
        match results.get(id) {
            Some(stages) => print_stage_rows(id, stages),
            None => println!("{} {id}: no stages found", style("!").yellow()),
        }
    }
    Ok(())
}

fn print_stage_rows(pipeline_id: &str, stages: &[crate::client::StageRow]) {
    println!("{}", style(pipeline_id).bold());
    for stage in stages {
        println!("  {:<20} {}", stage.name, stage.status);
        if !stage.message.is_empty() {
            println!("    message: {}", stage.message.trim_end());
        }
        for url in &stage.artifact_urls {
            println!("    artifact: {url}");
        }
    }
}

/// Show configuration.
pub fn show_config(config: &CliConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    println!("api_url: {}", config.api_url);
    println!("client_id: {}", config.client_id);
    if let Ok(path) = CliConfig::config_path() {
        println!("config file: {}", path.display());
    }
    Ok(())
}

/// Set configuration.
pub fn set_config(key: &str, value: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut config = CliConfig::load().unwrap_or_default();
    match key {
        "api_url" => config.api_url = value.to_string(),
        "client_id" => config.client_id = value.to_string(),
        other => return Err(format!("unknown config key: {other}").into()),
    }
    config.save()?;
    println!("{} set {key} = {value}", style("✓").green());
    Ok(())
}

fn load_descriptor(path: &Path) -> Result<PipelineDescriptor, Box<dyn std::error::Error + Send + Sync>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let yaml: YamlPipeline = serde_yaml::from_str(&content)?;
    Ok(yaml.into())
}
