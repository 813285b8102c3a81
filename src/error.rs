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

// Error types for the backup writer pipeline

use std::fmt;
use std::io;
use thiserror::Error;

use crate::layer::LayerKind;

/// Result type alias for writer operations.
pub type Result<T> = std::result::Result<T, WriterError>;

/// Operation that was running on a layer when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerOp {
    Write,
    Flush,
    Close,
}

impl fmt::Display for LayerOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            LayerOp::Write => "writing",
            LayerOp::Flush => "flushing",
            LayerOp::Close => "closing",
        };
        f.write_str(verb)
    }
}

#[derive(Debug, Error)]
pub enum WriterError {
    /// Destination kind is unknown or its settings block is missing.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("cannot create destination file {path}: {source}")]
    DestinationCreate {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The object-store client or runtime could not be set up.
    #[error("cannot establish object store session: {0}")]
    Session(String),

    #[error("cannot construct {kind} layer '{name}': {source}")]
    Construction {
        kind: LayerKind,
        name: &'static str,
        #[source]
        source: io::Error,
    },

    /// Failure on one layer of the stack; `index` 0 is the sink.
    #[error("error {op} writer {index} ({layer}): {source}")]
    Layer {
        index: usize,
        layer: &'static str,
        op: LayerOp,
        #[source]
        source: io::Error,
    },

    #[error("upload of '{key}' to bucket '{bucket}' failed: {source}")]
    Upload {
        bucket: String,
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("unsupported compression type '{0}'. Supported: none, gzip, lz4, snappy")]
    UnsupportedCompression(String),

    #[error("unsupported cipher '{0}'. Supported: no-cipher")]
    UnsupportedCipher(String),

    #[error("invalid compression level {0}: must be 0-4")]
    InvalidCompressionLevel(u8),

    #[error("there are no backup writers")]
    EmptyStack,

    #[error("backup writer is already closed")]
    Closed,

    /// Two independent failures, e.g. a layer error followed by an upload error.
    #[error("{primary} (additionally: {secondary})")]
    Multiple {
        primary: Box<WriterError>,
        secondary: Box<WriterError>,
    },
}

impl WriterError {
    /// Combine an optional earlier error with a later one.
    pub fn merge(primary: Option<WriterError>, secondary: Option<WriterError>) -> Option<Self> {
        match (primary, secondary) {
            (Some(primary), Some(secondary)) => Some(WriterError::Multiple {
                primary: Box::new(primary),
                secondary: Box::new(secondary),
            }),
            (Some(e), None) | (None, Some(e)) => Some(e),
            (None, None) => None,
        }
    }

    /// True if this error, or any error merged into it, is an upload failure.
    pub fn is_upload(&self) -> bool {
        match self {
            WriterError::Upload { .. } => true,
            WriterError::Multiple { primary, secondary } => {
                primary.is_upload() || secondary.is_upload()
            }
            _ => false,
        }
    }
}

impl From<WriterError> for io::Error {
    fn from(err: WriterError) -> Self {
        let kind = match &err {
            WriterError::Layer { source, .. } => source.kind(),
            WriterError::Closed => io::ErrorKind::BrokenPipe,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
