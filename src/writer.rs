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

/// Backup writer pipeline
///
/// Builds the layer stack for one backup object (sink, then codec, then
/// cipher), forwards application bytes to the outermost layer, and tears the
/// stack down on close:
///
/// 1. every layer is flushed then closed, outermost first
/// 2. the upload task, if any, is joined
/// 3. the upload outcome is merged into the close result
///
/// # Blocking
///
/// `write` and `close` block the calling thread (pipe backpressure, upload
/// join). Call them from a plain thread or `tokio::task::spawn_blocking`,
/// never directly from async code.
///
/// # Examples
///
/// ```no_run
/// use std::io::Write;
/// use backup_writer::{BackupWriter, Cipher, CompressionType, Destination};
///
/// let destination = Destination::filesystem("/tmp");
/// let mut writer = BackupWriter::open(
///     "backup.dat",
///     &destination,
///     CompressionType::Gzip,
///     Cipher::NoCipher,
/// )?;
/// writer.write_all(b"AAAA")?;
/// writer.close()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
use std::io::{self, Write};
use tracing::{debug, error, info, warn};

use crate::cipher::Cipher;
use crate::codec::{CodecLayer, CompressionLevel, CompressionType};
use crate::config::{BackupConfig, WriterSettings};
use crate::error::{Result, WriterError};
use crate::layer::{LayerHandle, LayerKind, LayerStack};
use crate::storage::{Destination, DestinationFactory, OpenedSink, UploadTask};

/// Lifecycle of a `BackupWriter`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Writable,
    Closing,
    Closed,
}

pub struct BackupWriter {
    name: String,
    layers: LayerStack,
    upload: Option<UploadTask>,
    state: WriterState,
    bytes_written: u64,
}

impl BackupWriter {
    /// Open a writer for object `name` with the default compression level
    pub fn open(
        name: &str,
        destination: &Destination,
        compression: CompressionType,
        cipher: Cipher,
    ) -> Result<Self> {
        Self::open_with_level(
            name,
            destination,
            compression,
            CompressionLevel::default(),
            cipher,
        )
    }

    /// Open a writer for object `name`
    ///
    /// If a codec or cipher layer fails to build, the sink opened before it
    /// is aborted (and its upload task joined) before the error is returned.
    pub fn open_with_level(
        name: &str,
        destination: &Destination,
        compression: CompressionType,
        level: CompressionLevel,
        cipher: Cipher,
    ) -> Result<Self> {
        Self::build(name, destination, |layers, sink| {
            push_wrappers(layers, sink, compression, level, cipher)
        })
    }

    /// Open the sink for `name`, then let `wrap` stack layers on top of it
    fn build<F>(name: &str, destination: &Destination, wrap: F) -> Result<Self>
    where
        F: FnOnce(&mut LayerStack, LayerHandle) -> Result<()>,
    {
        let OpenedSink { layer, upload } = destination.open_sink(name)?;

        let mut writer = Self {
            name: name.to_string(),
            layers: LayerStack::new(),
            upload,
            state: WriterState::Writable,
            bytes_written: 0,
        };

        let sink = writer.layers.push_boxed(LayerKind::Sink, layer);
        if let Err(e) = wrap(&mut writer.layers, sink) {
            return Err(writer.abandon(e));
        }
        if writer.layers.top().is_none() {
            return Err(writer.abandon(WriterError::EmptyStack));
        }

        info!(
            "Opened backup writer '{}' ({} destination, layers: {})",
            name,
            destination.kind(),
            writer.layers.names().join(" <- ")
        );

        Ok(writer)
    }

    /// Open a writer using string-typed settings from configuration
    pub fn open_with_settings(
        name: &str,
        destination: &Destination,
        settings: &WriterSettings,
    ) -> Result<Self> {
        let compression: CompressionType = settings.compression.parse()?;
        let level = CompressionLevel::try_from(settings.compression_level)?;
        let cipher: Cipher = settings.cipher.parse()?;

        Self::open_with_level(name, destination, compression, level, cipher)
    }

    /// Build the destination from `config` and open a writer on it
    ///
    /// Object-store destinations use the tokio runtime of the calling thread.
    pub fn from_config(name: &str, config: &BackupConfig) -> Result<Self> {
        let destination = DestinationFactory::create(&config.destination)?;
        Self::open_with_settings(name, &destination, &config.writer)
    }

    /// Release everything opened so far and fold cleanup failures into `err`
    fn abandon(&mut self, err: WriterError) -> WriterError {
        warn!("Failed to open backup writer '{}': {}", self.name, err);
        self.state = WriterState::Closed;
        self.layers.abort();

        // The pipe disconnect caused by the abort itself is not reported
        match self.upload.take().and_then(|task| task.wait_abandoned().err()) {
            Some(cleanup) => WriterError::Multiple {
                primary: Box::new(err),
                secondary: Box::new(cleanup),
            },
            None => err,
        }
    }

    /// Flush and close every layer, then wait for the upload to finish
    ///
    /// Returns the first layer failure and/or the upload failure. The
    /// upload task is joined even when a layer fails. A second call returns
    /// `WriterError::Closed`.
    pub fn close(&mut self) -> Result<()> {
        if self.state != WriterState::Writable {
            return Err(WriterError::Closed);
        }
        self.state = WriterState::Closing;
        debug!("Closing backup writer '{}'", self.name);

        let layer_error = self.layers.close().err();

        let upload_error = match self.upload.take() {
            Some(task) => {
                debug!("Waiting for upload of '{}' to finish", self.name);
                task.wait().err()
            }
            None => None,
        };

        self.state = WriterState::Closed;

        match WriterError::merge(layer_error, upload_error) {
            Some(e) => {
                error!("Backup writer '{}' failed to close: {}", self.name, e);
                Err(e)
            }
            None => {
                info!(
                    "Closed backup writer '{}' after {} bytes",
                    self.name, self.bytes_written
                );
                Ok(())
            }
        }
    }

    pub fn object_name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Application bytes accepted so far (before compression)
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Layer kinds from the sink (index 0) to the outermost layer
    pub fn layer_kinds(&self) -> Vec<LayerKind> {
        self.layers.kinds()
    }

    fn ensure_writable(&self) -> io::Result<()> {
        if self.state == WriterState::Writable {
            Ok(())
        } else {
            Err(WriterError::Closed.into())
        }
    }
}

fn push_wrappers(
    layers: &mut LayerStack,
    sink: LayerHandle,
    compression: CompressionType,
    level: CompressionLevel,
    cipher: Cipher,
) -> Result<()> {
    let mut top = sink;

    if let Some(codec) = CodecLayer::wrap(compression, level, top.clone())? {
        top = layers.push(LayerKind::Codec, codec);
    }

    if let Some(layer) = cipher.wrap(top)? {
        layers.push_boxed(LayerKind::Cipher, layer);
    }

    Ok(())
}

impl Write for BackupWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.ensure_writable()?;
        let written = self.layers.write(buf)?;
        self.bytes_written += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.ensure_writable()?;
        self.layers.flush()?;
        Ok(())
    }
}

impl Drop for BackupWriter {
    fn drop(&mut self) {
        if self.state == WriterState::Writable {
            warn!(
                "Backup writer '{}' dropped without close after {} bytes, aborting",
                self.name, self.bytes_written
            );
            // The upload task sees the pipe break and fails on its own
            self.layers.abort();
        }
    }
}
