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

// Destination factory for building destinations from configuration

use super::backend::{ObjectStoreClient, ObjectStoreSession};
use super::destination::{Destination, FilesystemDestination, ObjectStoreDestination};
use super::http::HttpObjectStore;
use crate::config::{DestinationConfig, FilesystemConfig, ObjectStoreConfig};
use crate::error::WriterError;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;

pub struct DestinationFactory;

impl DestinationFactory {
    /// Create destination from configuration
    ///
    /// Object-store destinations get an `HttpObjectStore` client bound to the
    /// current tokio runtime.
    pub fn create(config: &DestinationConfig) -> Result<Destination, WriterError> {
        match Self::kind(config)? {
            DestinationKind::Filesystem(filesystem) => Ok(Self::filesystem(filesystem)),
            DestinationKind::ObjectStore(object_store) => {
                let client = HttpObjectStore::new(object_store)
                    .map_err(|e| WriterError::Session(format!("{:#}", e)))?;
                let session = ObjectStoreSession::from_current(Arc::new(client))?;
                Ok(Self::object_store(object_store, session))
            }
        }
    }

    /// Create destination from configuration with a pre-built object store client
    pub fn create_with_client(
        config: &DestinationConfig,
        client: Arc<dyn ObjectStoreClient>,
        runtime: Handle,
    ) -> Result<Destination, WriterError> {
        match Self::kind(config)? {
            DestinationKind::Filesystem(filesystem) => Ok(Self::filesystem(filesystem)),
            DestinationKind::ObjectStore(object_store) => Ok(Self::object_store(
                object_store,
                ObjectStoreSession::new(client, runtime)?,
            )),
        }
    }

    fn kind(config: &DestinationConfig) -> Result<DestinationKind<'_>, WriterError> {
        match config.kind.as_str() {
            "filesystem" => config
                .filesystem
                .as_ref()
                .map(DestinationKind::Filesystem)
                .ok_or_else(|| {
                    WriterError::Configuration("Filesystem config missing".to_string())
                }),

            "object-store" | "s3" => config
                .object_store
                .as_ref()
                .map(DestinationKind::ObjectStore)
                .ok_or_else(|| {
                    WriterError::Configuration("Object store config missing".to_string())
                }),

            unknown => Err(WriterError::Configuration(format!(
                "Don't know how to handle '{}' destination kind. Supported: filesystem, object-store",
                unknown
            ))),
        }
    }

    fn filesystem(config: &FilesystemConfig) -> Destination {
        Destination::Filesystem(FilesystemDestination {
            path: PathBuf::from(&config.path),
            create_dir: config.create_dir,
        })
    }

    fn object_store(config: &ObjectStoreConfig, session: ObjectStoreSession) -> Destination {
        Destination::ObjectStore(ObjectStoreDestination {
            bucket: config.bucket.clone(),
            session,
            pipe_capacity: config.pipe_capacity,
            chunk_size: config.chunk_size_bytes,
        })
    }
}

enum DestinationKind<'a> {
    Filesystem(&'a FilesystemConfig),
    ObjectStore(&'a ObjectStoreConfig),
}
