// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Configuration types for backup-writer

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BackupConfig {
    pub destination: DestinationConfig,
    #[serde(default)]
    pub writer: WriterSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Destination configuration with kind selection
///
/// Both settings blocks may be present; `kind` picks the one in effect.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DestinationConfig {
    /// Destination kind: "filesystem" or "object-store"
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesystem: Option<FilesystemConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_store: Option<ObjectStoreConfig>,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            kind: "filesystem".to_string(),
            filesystem: Some(FilesystemConfig::default()),
            object_store: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilesystemConfig {
    pub path: String,
    /// Create missing directories instead of failing
    #[serde(default)]
    pub create_dir: bool,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            path: "/var/backups".to_string(),
            create_dir: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObjectStoreConfig {
    pub url: String,
    pub bucket: String,
    #[serde(default)]
    pub api_token: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Chunks buffered between the writer and the upload task
    #[serde(default = "default_pipe_capacity")]
    pub pipe_capacity: usize,

    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: usize,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9000".to_string(),
            bucket: "backups".to_string(),
            api_token: None,
            timeout_seconds: default_timeout(),
            pipe_capacity: default_pipe_capacity(),
            chunk_size_bytes: default_chunk_size(),
        }
    }
}

impl ObjectStoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Stream encoding settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WriterSettings {
    #[serde(default = "default_compression")]
    pub compression: String, // "none", "gzip", "lz4", "snappy"

    #[serde(default = "default_compression_level")]
    pub compression_level: u8, // 0-4

    #[serde(default = "default_cipher")]
    pub cipher: String, // "no-cipher"
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            compression: default_compression(),
            compression_level: default_compression_level(),
            cipher: default_cipher(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"

    #[serde(default = "default_log_format")]
    pub format: String, // "text", "compact"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_timeout() -> u64 { 3600 }
fn default_pipe_capacity() -> usize { 16 }
fn default_chunk_size() -> usize { 64 * 1024 }
fn default_compression() -> String { "gzip".to_string() }
fn default_compression_level() -> u8 { 2 }
fn default_cipher() -> String { "no-cipher".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "text".to_string() }
