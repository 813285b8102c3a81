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

// HTTP object store client

use super::backend::ObjectStoreClient;
use super::pipe::UploadBody;
use crate::config::ObjectStoreConfig;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Object store speaking plain HTTP: `PUT {url}/{bucket}/{key}`
///
/// The request body is streamed straight from the writer's pipe, so the
/// object is never buffered in full.
pub struct HttpObjectStore {
    client: Client,
    base_url: String,
}

impl HttpObjectStore {
    pub fn new(config: &ObjectStoreConfig) -> Result<Self> {
        let mut client_builder = reqwest::ClientBuilder::new()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(config.timeout());

        // Add API token if provided
        if let Some(token) = &config.api_token {
            let mut headers = reqwest::header::HeaderMap::new();
            let auth_value = format!("Bearer {}", token);
            headers.insert(
                reqwest::header::AUTHORIZATION,
                reqwest::header::HeaderValue::from_str(&auth_value).context("Invalid API token")?,
            );
            client_builder = client_builder.default_headers(headers);
        }

        let client = client_builder
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    fn bucket_url(&self, bucket: &str) -> String {
        format!("{}/{}", self.base_url, bucket)
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, bucket, key.trim_start_matches('/'))
    }
}

#[async_trait]
impl ObjectStoreClient for HttpObjectStore {
    /// Create bucket if it doesn't exist
    async fn initialize(&self, bucket: &str) -> Result<()> {
        let url = self.bucket_url(bucket);

        match self.client.head(&url).send().await {
            Ok(response) if response.status().is_success() => {
                info!("Bucket '{}' already exists", bucket);
                Ok(())
            }
            _ => {
                info!("Creating bucket '{}'", bucket);
                let response = self
                    .client
                    .put(&url)
                    .send()
                    .await
                    .context("Failed to create bucket")?;

                if response.status().is_success() || response.status().as_u16() == 409 {
                    info!("Bucket '{}' ready", bucket);
                    Ok(())
                } else {
                    let status = response.status();
                    let error_text = response.text().await.unwrap_or_default();
                    bail!("Failed to create bucket: {} - {}", status, error_text)
                }
            }
        }
    }

    async fn put_object(&self, bucket: &str, key: &str, body: UploadBody) -> Result<()> {
        let url = self.object_url(bucket, key);
        debug!("Streaming upload to {}", url);

        let response = self
            .client
            .put(&url)
            .header("Content-Type", "application/octet-stream")
            .body(reqwest::Body::wrap_stream(body.into_stream()))
            .send()
            .await
            .context("Failed to send upload request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("Upload failed with status {}: {}", status, error_text);
        }

        Ok(())
    }

    fn client_type(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(url: &str) -> HttpObjectStore {
        let config = ObjectStoreConfig {
            url: url.to_string(),
            ..ObjectStoreConfig::default()
        };
        HttpObjectStore::new(&config).unwrap()
    }

    #[test]
    fn test_object_url() {
        let store = store("http://localhost:9000/");
        assert_eq!(store.bucket_url("backups"), "http://localhost:9000/backups");
        assert_eq!(
            store.object_url("backups", "/2025/backup.dat"),
            "http://localhost:9000/backups/2025/backup.dat"
        );
        assert_eq!(store.client_type(), "http");
    }

    #[test]
    fn test_invalid_token() {
        let config = ObjectStoreConfig {
            api_token: Some("bad\ntoken".to_string()),
            ..ObjectStoreConfig::default()
        };
        assert!(HttpObjectStore::new(&config).is_err());
    }
}
