//! CLI configuration management.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// API server URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Caller identity sent as `x-client-id` on every request.
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            client_id: default_client_id(),
        }
    }
}

fn default_api_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_client_id() -> String {
    whoami_fallback()
}

fn whoami_fallback() -> String {
    std::env::var("KILN_CLIENT_ID")
        .or_else(|_| std::env::var("USER"))
        .unwrap_or_else(|_| "anonymous".to_string())
}

impl CliConfig {
    /// Load configuration from file, falling back to defaults if absent.
    pub fn load() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let path = Self::config_path()?;
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            Ok(serde_yaml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the configuration file path.
    pub fn config_path() -> Result<PathBuf, Box<dyn std::error::Error + Send + Sync>> {
        let dirs = directories::ProjectDirs::from("ci", "kiln", "kiln-cli")
            .ok_or("Could not determine config directory")?;
        Ok(dirs.config_dir().join("config.yaml"))
    }
}
