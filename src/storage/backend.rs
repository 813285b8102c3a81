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

// Object store client trait and session handle

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};

use super::pipe::UploadBody;
use crate::error::WriterError;

/// Client for a remote object store
///
/// Implementations receive the backup as a stream of chunks and must read
/// `body` until it returns `Ok(None)` before reporting success. A read error
/// from `body` means the writer was abandoned and the object must not be
/// committed.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// Prepare the bucket (create it if needed)
    async fn initialize(&self, _bucket: &str) -> Result<()> {
        Ok(())
    }

    /// Upload one object from a streamed body
    ///
    /// # Arguments
    /// * `bucket` - Target bucket
    /// * `key` - Object key, the backup's object name
    /// * `body` - Bytes produced by the writer, in write order
    async fn put_object(&self, bucket: &str, key: &str, body: UploadBody) -> Result<()>;

    /// Get client type identifier
    fn client_type(&self) -> &str;
}

/// Pre-built object store client together with the runtime its uploads run on
#[derive(Clone)]
pub struct ObjectStoreSession {
    client: Arc<dyn ObjectStoreClient>,
    runtime: Handle,
}

impl ObjectStoreSession {
    /// Bind `client` to the runtime behind `runtime`
    ///
    /// The runtime must be multi-threaded. Writers join the upload with
    /// `Handle::block_on`, which never drives the other tasks of a
    /// current-thread runtime, so an upload spawned there would never run.
    pub fn new(client: Arc<dyn ObjectStoreClient>, runtime: Handle) -> Result<Self, WriterError> {
        if runtime.runtime_flavor() == RuntimeFlavor::CurrentThread {
            return Err(WriterError::Session(
                "object store uploads need a multi-threaded tokio runtime".to_string(),
            ));
        }
        Ok(Self { client, runtime })
    }

    /// Session bound to the runtime of the calling thread
    pub fn from_current(client: Arc<dyn ObjectStoreClient>) -> Result<Self, WriterError> {
        let runtime = Handle::try_current()
            .map_err(|e| WriterError::Session(format!("no tokio runtime available: {}", e)))?;
        Self::new(client, runtime)
    }

    pub fn client(&self) -> &Arc<dyn ObjectStoreClient> {
        &self.client
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }
}

impl fmt::Debug for ObjectStoreSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreSession")
            .field("client", &self.client.client_type())
            .finish()
    }
}
