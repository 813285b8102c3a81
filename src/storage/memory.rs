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

// In-process object store, for tests and dry runs

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use tracing::debug;

use super::backend::ObjectStoreClient;
use super::pipe::UploadBody;

/// Object store keeping every uploaded object in memory
///
/// An object only becomes visible once its body was read to a clean end.
#[derive(Default)]
pub struct MemoryObjectStore {
    buckets: DashSet<String>,
    objects: DashMap<(String, String), Bytes>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|entry| entry.value().clone())
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .contains_key(&(bucket.to_string(), key.to_string()))
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.buckets.contains(bucket)
    }

    /// Sorted keys stored under `bucket`
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .iter()
            .filter(|entry| entry.key().0 == bucket)
            .map(|entry| entry.key().1.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStoreClient for MemoryObjectStore {
    async fn initialize(&self, bucket: &str) -> Result<()> {
        self.buckets.insert(bucket.to_string());
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: UploadBody) -> Result<()> {
        let data = body
            .read_to_end()
            .await
            .with_context(|| format!("Failed to read body for '{}'", key))?;

        debug!(
            "Stored {} bytes as '{}' in bucket '{}'",
            data.len(),
            key,
            bucket
        );
        self.buckets.insert(bucket.to_string());
        self.objects
            .insert((bucket.to_string(), key.to_string()), data);
        Ok(())
    }

    fn client_type(&self) -> &str {
        "memory"
    }
}
