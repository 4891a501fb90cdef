// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Load configuration from a file (YAML or JSON)
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config: Config = if path.extension().and_then(|s| s.to_str()) == Some("yaml")
        || path.extension().and_then(|s| s.to_str()) == Some("yml") {
        serde_yaml::from_str(&contents).context("Failed to parse YAML config")?
    } else {
        serde_json::from_str(&contents).context("Failed to parse JSON config")?
    };

    config.validate()?;
    Ok(config)
}

/// Resolve the config path from the CLI argument, `SENTINEL_CONFIG`, or
/// `config.yaml`; falls back to built-in defaults when none of them exist.
pub async fn load_config_with_fallback(cli_path: Option<String>) -> Result<Config> {
    let explicit = cli_path.or_else(|| std::env::var("SENTINEL_CONFIG").ok());

    if let Some(path) = explicit {
        info!("Loading configuration from: {}", path);
        return load_config(&path).await;
    }

    let default_path = PathBuf::from("config.yaml");
    if tokio::fs::try_exists(&default_path).await.unwrap_or(false) {
        info!("Loading configuration from: {}", default_path.display());
        return load_config(&default_path).await;
    }

    info!("No configuration file found, using defaults");
    let config = Config::default();
    config.validate()?;
    Ok(config)
}
