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

// Bounded pipe between the synchronous writer and the upload task
//
// The write end is a blocking `WriterLayer`; the read end is an async
// `UploadBody` handed to the object store client. At most `capacity` chunks
// of at most `chunk_size` bytes are in flight, so a slow upload blocks the
// writer instead of growing memory.

use bytes::{Bytes, BytesMut};
use futures::Stream;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::backend::ObjectStoreSession;
use crate::error::WriterError;
use crate::layer::WriterLayer;

enum Chunk {
    Data(Bytes),
    /// Clean end of stream, sent by `PipeWriter::close`
    End,
}

/// Create a bounded pipe
///
/// `capacity` and `chunk_size` must be non-zero.
pub fn pipe(capacity: usize, chunk_size: usize) -> (PipeWriter, UploadBody) {
    let (tx, rx) = mpsc::channel(capacity);
    let bytes_read = Arc::new(AtomicU64::new(0));
    (
        PipeWriter {
            tx: Some(tx),
            chunk_size,
        },
        UploadBody {
            rx,
            finished: false,
            bytes_read,
        },
    )
}

/// Write end of the pipe
///
/// Blocks while the pipe is full. Must not be used from inside an async
/// execution context.
pub struct PipeWriter {
    tx: Option<mpsc::Sender<Chunk>>,
    chunk_size: usize,
}

impl PipeWriter {
    fn sender(&self) -> io::Result<&mpsc::Sender<Chunk>> {
        self.tx
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "pipe is closed"))
    }
}

fn reader_gone() -> io::Error {
    io::Error::new(
        io::ErrorKind::BrokenPipe,
        "upload task stopped reading from the pipe",
    )
}

impl WriterLayer for PipeWriter {
    fn name(&self) -> &'static str {
        "pipe"
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let tx = self.sender()?;
        if buf.is_empty() {
            return Ok(0);
        }
        let len = buf.len().min(self.chunk_size);
        tx.blocking_send(Chunk::Data(Bytes::copy_from_slice(&buf[..len])))
            .map_err(|_| reader_gone())?;
        Ok(len)
    }

    fn close(&mut self) -> io::Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.blocking_send(Chunk::End).map_err(|_| reader_gone())?;
        }
        Ok(())
    }

    fn abort(&mut self) {
        self.tx = None;
    }
}

/// Read end of the pipe, consumed by an `ObjectStoreClient`
pub struct UploadBody {
    rx: mpsc::Receiver<Chunk>,
    finished: bool,
    bytes_read: Arc<AtomicU64>,
}

impl UploadBody {
    /// Next chunk in write order
    ///
    /// Returns `Ok(None)` once the writer closed the pipe, and an
    /// `UnexpectedEof` error if the writer went away without closing.
    pub async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        if self.finished {
            return Ok(None);
        }
        match self.rx.recv().await {
            Some(Chunk::Data(bytes)) => {
                self.bytes_read
                    .fetch_add(bytes.len() as u64, Ordering::Relaxed);
                Ok(Some(bytes))
            }
            Some(Chunk::End) => {
                self.finished = true;
                self.rx.close();
                Ok(None)
            }
            None => {
                self.finished = true;
                Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "backup writer went away before closing the stream",
                ))
            }
        }
    }

    /// Buffer the whole body
    pub async fn read_to_end(mut self) -> io::Result<Bytes> {
        let mut buffer = BytesMut::new();
        while let Some(chunk) = self.next_chunk().await? {
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer.freeze())
    }

    /// Total bytes handed out so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    fn counter(&self) -> Arc<AtomicU64> {
        self.bytes_read.clone()
    }

    /// Adapt into a `Stream`, e.g. for a streaming HTTP request body
    pub fn into_stream(self) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        futures::stream::unfold(self, |mut body| async move {
            match body.next_chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), body)),
                Ok(None) => None,
                Err(e) => Some((Err(e), body)),
            }
        })
    }
}

/// Background upload of one object
///
/// The join handle carries the upload result, so the outcome is only
/// observable once the task has completed.
pub struct UploadTask {
    bucket: String,
    key: String,
    session: ObjectStoreSession,
    bytes_read: Arc<AtomicU64>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl UploadTask {
    /// Start streaming `body` to `bucket/key`
    pub fn spawn(session: &ObjectStoreSession, bucket: &str, key: &str, body: UploadBody) -> Self {
        let bytes_read = body.counter();
        let client = session.client().clone();
        let task_bucket = bucket.to_string();
        let task_key = key.to_string();
        let task_bytes = bytes_read.clone();

        debug!(
            "Starting {} upload of '{}' to bucket '{}'",
            client.client_type(),
            key,
            bucket
        );

        let handle = session.runtime().spawn(async move {
            let result = client.put_object(&task_bucket, &task_key, body).await;
            match &result {
                Ok(()) => info!(
                    "Uploaded '{}' to bucket '{}' ({} bytes)",
                    task_key,
                    task_bucket,
                    task_bytes.load(Ordering::Relaxed)
                ),
                Err(e) => error!(
                    "Upload of '{}' to bucket '{}' failed: {:#}",
                    task_key, task_bucket, e
                ),
            }
            result
        });

        Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
            session: session.clone(),
            bytes_read,
            handle,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Bytes the client has consumed from the pipe so far
    pub fn bytes_uploaded(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    /// Block until the upload task completes and return its outcome
    pub fn wait(self) -> Result<(), WriterError> {
        self.join(false)
    }

    /// Join an upload whose writer was aborted
    ///
    /// The client sees the pipe end without a clean close, so a failure
    /// caused only by that disconnect is not an error here. Any other
    /// client failure is still returned.
    pub fn wait_abandoned(self) -> Result<(), WriterError> {
        self.join(true)
    }

    fn join(self, abandoned: bool) -> Result<(), WriterError> {
        let Self {
            bucket,
            key,
            session,
            handle,
            ..
        } = self;

        match session.runtime().block_on(handle) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) if abandoned && is_disconnect(&e) => {
                debug!("Abandoned upload of '{}' to bucket '{}' stopped", key, bucket);
                Ok(())
            }
            Ok(Err(e)) => Err(WriterError::Upload {
                bucket,
                key,
                source: e.into(),
            }),
            Err(join_error) => Err(WriterError::Upload {
                bucket,
                key,
                source: Box::new(join_error),
            }),
        }
    }
}

/// True when `err` comes from the pipe ending without a clean close
fn is_disconnect(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::UnexpectedEof)
    })
}
