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

// Ordered stack of writer layers
//
// Index 0 is the destination sink, the last index is the outermost layer
// that receives application bytes. Wrapping layers (codecs, ciphers) hold a
// `LayerHandle` to the layer directly beneath them, so the stack owns every
// layer while each wrapper can still forward into the next one down.

use std::fmt;
use std::io;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::error::{LayerOp, Result, WriterError};

/// One stage of the write/flush/close stack
///
/// `close` must finish this layer only. Wrapping layers emit their trailer
/// into the layer beneath but never close it: the stack closes every layer
/// itself, outermost first.
pub trait WriterLayer: Send {
    /// Short identifier used in logs and errors ("file", "gzip", ...)
    fn name(&self) -> &'static str;

    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Push buffered bytes to the layer beneath. No-op for unbuffered layers.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn close(&mut self) -> io::Result<()>;

    /// Give up without finishing. Later writes to this layer should fail fast.
    fn abort(&mut self) {}
}

/// Role of a layer within the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Sink,
    Codec,
    Cipher,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayerKind::Sink => "sink",
            LayerKind::Codec => "codec",
            LayerKind::Cipher => "cipher",
        };
        f.write_str(name)
    }
}

/// Shared handle to a layer in the stack
///
/// Implements `io::Write` so off-the-shelf encoders can wrap it directly.
#[derive(Clone)]
pub struct LayerHandle {
    name: &'static str,
    inner: Arc<Mutex<Box<dyn WriterLayer>>>,
}

impl LayerHandle {
    fn new(layer: Box<dyn WriterLayer>) -> Self {
        Self {
            name: layer.name(),
            inner: Arc::new(Mutex::new(layer)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn with<R>(&self, f: impl FnOnce(&mut dyn WriterLayer) -> io::Result<R>) -> io::Result<R> {
        let mut guard = self.inner.lock().map_err(|_| {
            io::Error::other(format!("writer layer '{}' is poisoned", self.name))
        })?;
        f(guard.as_mut())
    }
}

impl io::Write for LayerHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with(|layer| layer.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with(|layer| layer.flush())
    }
}

impl fmt::Debug for LayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerHandle").field("name", &self.name).finish()
    }
}

struct StackEntry {
    kind: LayerKind,
    handle: LayerHandle,
}

/// Ordered sequence of writer layers, torn down in reverse construction order
#[derive(Default)]
pub struct LayerStack {
    layers: Vec<StackEntry>,
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new outermost layer and return a handle to it
    pub fn push<L: WriterLayer + 'static>(&mut self, kind: LayerKind, layer: L) -> LayerHandle {
        self.push_boxed(kind, Box::new(layer))
    }

    pub fn push_boxed(&mut self, kind: LayerKind, layer: Box<dyn WriterLayer>) -> LayerHandle {
        let handle = LayerHandle::new(layer);
        debug!(
            "Pushed {} layer '{}' at index {}",
            kind,
            handle.name(),
            self.layers.len()
        );
        self.layers.push(StackEntry {
            kind,
            handle: handle.clone(),
        });
        handle
    }

    /// Handle to the outermost layer
    pub fn top(&self) -> Option<LayerHandle> {
        self.layers.last().map(|entry| entry.handle.clone())
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn kinds(&self) -> Vec<LayerKind> {
        self.layers.iter().map(|entry| entry.kind).collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.layers.iter().map(|entry| entry.handle.name()).collect()
    }

    /// Write to the outermost layer
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let index = self
            .layers
            .len()
            .checked_sub(1)
            .ok_or(WriterError::EmptyStack)?;
        let entry = &self.layers[index];
        entry
            .handle
            .with(|layer| layer.write(buf))
            .map_err(|source| WriterError::Layer {
                index,
                layer: entry.handle.name(),
                op: LayerOp::Write,
                source,
            })
    }

    /// Flush then close every layer, outermost first
    ///
    /// The first failure stops the walk. Either way the stack is emptied and
    /// all layers are dropped before returning.
    pub fn close(&mut self) -> Result<()> {
        let layers = std::mem::take(&mut self.layers);

        for (index, entry) in layers.iter().enumerate().rev() {
            let name = entry.handle.name();

            debug!("Flushing writer {} ({})", index, name);
            entry
                .handle
                .with(|layer| layer.flush())
                .map_err(|source| WriterError::Layer {
                    index,
                    layer: name,
                    op: LayerOp::Flush,
                    source,
                })?;

            debug!("Closing writer {} ({})", index, name);
            entry
                .handle
                .with(|layer| layer.close())
                .map_err(|source| WriterError::Layer {
                    index,
                    layer: name,
                    op: LayerOp::Close,
                    source,
                })?;
        }

        Ok(())
    }

    /// Drop every layer without flushing or closing
    ///
    /// The sink is aborted first so that wrappers emitting bytes on drop
    /// cannot block on it.
    pub fn abort(&mut self) {
        if self.layers.is_empty() {
            return;
        }
        warn!(
            "Aborting writer stack [{}] without closing",
            self.names().join(" <- ")
        );
        for entry in &self.layers {
            let _ = entry.handle.with(|layer| {
                layer.abort();
                Ok(())
            });
        }
        self.layers.clear();
    }

    /// Flush every layer, outermost first
    pub fn flush(&mut self) -> Result<()> {
        for (index, entry) in self.layers.iter().enumerate().rev() {
            entry
                .handle
                .with(|layer| layer.flush())
                .map_err(|source| WriterError::Layer {
                    index,
                    layer: entry.handle.name(),
                    op: LayerOp::Flush,
                    source,
                })?;
        }
        Ok(())
    }
}

impl fmt::Debug for LayerStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
