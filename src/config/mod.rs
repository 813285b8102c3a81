// Configuration module for backup-writer
//
// Provides:
// - YAML configuration file loading
// - Environment variable substitution
// - Configuration validation
// - Default values

pub mod types;
mod loader;

pub use types::*;
pub use loader::ConfigLoader;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<BackupConfig> {
    ConfigLoader::load(path).context("Failed to load configuration")
}

/// Load configuration with environment variable overrides
pub fn load_config_with_env<P: AsRef<Path>>(path: P) -> Result<BackupConfig> {
    let mut config = load_config(path)?;
    apply_env_overrides(&mut config);
    ConfigLoader::validate(&config)?;
    Ok(config)
}

/// Allow environment variables to override destination settings
fn apply_env_overrides(config: &mut BackupConfig) {
    let destination = &mut config.destination;

    if let Ok(path) = std::env::var("BACKUP_FILESYSTEM_PATH") {
        if let Some(filesystem) = destination.filesystem.as_mut() {
            filesystem.path = path;
        }
    }

    if let Some(object_store) = destination.object_store.as_mut() {
        if let Ok(url) = std::env::var("OBJECT_STORE_URL") {
            object_store.url = url;
        }
        if let Ok(bucket) = std::env::var("OBJECT_STORE_BUCKET") {
            object_store.bucket = bucket;
        }
        if let Ok(api_token) = std::env::var("OBJECT_STORE_API_TOKEN") {
            object_store.api_token = Some(api_token);
        }
    }
}
