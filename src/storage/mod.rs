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

// Storage destination module
//
// Provides the innermost layer of a backup writer: a local file, or a
// bounded pipe feeding a background upload to an object store. Object store
// clients sit behind a trait so the writer can upload to different systems
// (plain HTTP stores, in-memory stores for tests, ...).

pub mod backend;
pub mod destination;
pub mod factory;
pub mod filesystem;
pub mod http;
pub mod memory;
pub mod pipe;

pub use backend::{ObjectStoreClient, ObjectStoreSession};
pub use destination::{
    Destination, FilesystemDestination, ObjectStoreDestination, OpenedSink,
    DEFAULT_CHUNK_SIZE, DEFAULT_PIPE_CAPACITY,
};
pub use factory::DestinationFactory;
pub use filesystem::FileSink;
pub use http::HttpObjectStore;
pub use memory::MemoryObjectStore;
pub use pipe::{pipe, PipeWriter, UploadBody, UploadTask};
