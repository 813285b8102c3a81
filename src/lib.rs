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

// Layered streaming backup writer
//
// Accepts an arbitrary byte stream and persists it as one named backup
// object:
// - Optional compression (gzip, lz4, snappy) on top of the destination
// - Local filesystem destination
// - Object store destination fed through a bounded pipe and a background
//   upload task
// - Ordered, error-checked teardown that reports upload failures on close

pub mod cipher;
pub mod codec;
pub mod config;
pub mod error;
pub mod layer;
pub mod storage;
pub mod writer;

// Re-export main types
pub use cipher::Cipher;
pub use codec::{CodecLayer, CompressionLevel, CompressionType};
pub use config::{load_config, load_config_with_env, BackupConfig};
pub use error::{LayerOp, Result, WriterError};
pub use layer::{LayerHandle, LayerKind, LayerStack, WriterLayer};
pub use storage::{
    Destination, DestinationFactory, HttpObjectStore, MemoryObjectStore, ObjectStoreClient,
    ObjectStoreSession,
};
pub use writer::{BackupWriter, WriterState};
