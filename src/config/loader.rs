// Configuration loader with environment variable substitution

use super::types::*;
use crate::cipher::Cipher;
use crate::codec::{CompressionLevel, CompressionType};
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<BackupConfig> {
        let content = std::fs::read_to_string(path.as_ref())
            .context("Failed to read config file")?;

        Self::parse(&content)
    }

    /// Parse configuration from a YAML string
    pub fn parse(content: &str) -> Result<BackupConfig> {
        // Substitute environment variables
        let content = Self::substitute_env_vars(content)?;

        let config: BackupConfig = serde_yaml::from_str(&content)
            .context("Failed to parse YAML configuration")?;

        Self::validate(&config)?;

        Ok(config)
    }

    /// Substitute ${VAR} and ${VAR:-default} patterns with environment variables
    ///
    /// Examples:
    /// - ${HOME} -> /home/user
    /// - ${BACKUP_BUCKET:-backups} -> backups (if BACKUP_BUCKET not set)
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]+))?\}")
            .context("Invalid environment variable pattern")?;

        let substituted = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str());

            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => match default_value {
                    Some(default) => default.to_string(),
                    // Keep original if no default and var not found
                    None => format!("${{{}}}", var_name),
                },
            }
        });

        Ok(substituted.into_owned())
    }

    /// Validate configuration
    pub fn validate(config: &BackupConfig) -> Result<()> {
        let destination = &config.destination;
        match destination.kind.as_str() {
            "filesystem" => {
                let Some(filesystem) = destination.filesystem.as_ref() else {
                    bail!("filesystem destination selected but filesystem config missing");
                };
                if filesystem.path.is_empty() {
                    bail!("destination.filesystem.path cannot be empty");
                }
            }
            "object-store" | "s3" => {
                let Some(object_store) = destination.object_store.as_ref() else {
                    bail!("object-store destination selected but object_store config missing");
                };
                if object_store.url.is_empty() {
                    bail!("destination.object_store.url cannot be empty");
                }
                if object_store.bucket.is_empty() {
                    bail!("destination.object_store.bucket cannot be empty");
                }
                if object_store.pipe_capacity == 0 {
                    bail!("destination.object_store.pipe_capacity must be > 0");
                }
                if object_store.chunk_size_bytes == 0 {
                    bail!("destination.object_store.chunk_size_bytes must be > 0");
                }
            }
            unknown => bail!(
                "Unknown destination kind: '{}'. Supported: filesystem, object-store",
                unknown
            ),
        }

        config
            .writer
            .compression
            .parse::<CompressionType>()
            .context("Invalid writer.compression")?;

        CompressionLevel::try_from(config.writer.compression_level)
            .context("Invalid writer.compression_level")?;

        config
            .writer
            .cipher
            .parse::<Cipher>()
            .context("Invalid writer.cipher")?;

        Ok(())
    }
}
