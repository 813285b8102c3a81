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

// Destination descriptors and sink construction

use std::path::PathBuf;
use tracing::debug;

use super::backend::ObjectStoreSession;
use super::filesystem::FileSink;
use super::pipe::{pipe, UploadTask};
use crate::error::WriterError;
use crate::layer::WriterLayer;

pub const DEFAULT_PIPE_CAPACITY: usize = 16;
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Where a backup is written
#[derive(Debug, Clone)]
pub enum Destination {
    Filesystem(FilesystemDestination),
    ObjectStore(ObjectStoreDestination),
}

#[derive(Debug, Clone)]
pub struct FilesystemDestination {
    pub path: PathBuf,
    pub create_dir: bool,
}

#[derive(Debug, Clone)]
pub struct ObjectStoreDestination {
    pub bucket: String,
    pub session: ObjectStoreSession,
    pub pipe_capacity: usize,
    pub chunk_size: usize,
}

/// Innermost layer for one backup, plus its upload task if any
pub struct OpenedSink {
    pub layer: Box<dyn WriterLayer>,
    pub upload: Option<UploadTask>,
}

impl Destination {
    pub fn filesystem(path: impl Into<PathBuf>) -> Self {
        Destination::Filesystem(FilesystemDestination {
            path: path.into(),
            create_dir: false,
        })
    }

    pub fn object_store(bucket: impl Into<String>, session: ObjectStoreSession) -> Self {
        Destination::ObjectStore(ObjectStoreDestination {
            bucket: bucket.into(),
            session,
            pipe_capacity: DEFAULT_PIPE_CAPACITY,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Override pipe sizing; only meaningful for object-store destinations
    pub fn with_pipe(mut self, capacity: usize, chunk_size: usize) -> Self {
        if let Destination::ObjectStore(object_store) = &mut self {
            object_store.pipe_capacity = capacity;
            object_store.chunk_size = chunk_size;
        }
        self
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Destination::Filesystem(_) => "filesystem",
            Destination::ObjectStore(_) => "object-store",
        }
    }

    /// Open the sink layer for object `name`
    pub fn open_sink(&self, name: &str) -> Result<OpenedSink, WriterError> {
        match self {
            Destination::Filesystem(filesystem) => {
                let sink = FileSink::create(&filesystem.path, name, filesystem.create_dir)?;
                Ok(OpenedSink {
                    layer: Box::new(sink),
                    upload: None,
                })
            }
            Destination::ObjectStore(object_store) => {
                if object_store.pipe_capacity == 0 || object_store.chunk_size == 0 {
                    return Err(WriterError::Configuration(format!(
                        "pipe capacity and chunk size must be > 0 (got {} x {})",
                        object_store.pipe_capacity, object_store.chunk_size
                    )));
                }
                debug!(
                    "Opening pipe of {} x {} bytes for '{}'",
                    object_store.pipe_capacity, object_store.chunk_size, name
                );
                let (writer, body) = pipe(object_store.pipe_capacity, object_store.chunk_size);
                let upload =
                    UploadTask::spawn(&object_store.session, &object_store.bucket, name, body);
                Ok(OpenedSink {
                    layer: Box::new(writer),
                    upload: Some(upload),
                })
            }
        }
    }
}
