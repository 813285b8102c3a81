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

/// Streaming compression layers
///
/// Each codec wraps the layer beneath it with a stream encoder:
/// - gzip via `flate2`
/// - LZ4 frame format via `lz4`
/// - Snappy framing format via `snap`
///
/// Closing a codec layer writes the final block and trailer downstream but
/// leaves the downstream layer open.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use tracing::debug;

use crate::error::WriterError;
use crate::layer::{LayerHandle, LayerKind, WriterLayer};

/// Compression type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    #[default]
    None,
    Gzip,
    Lz4,
    Snappy,
}

impl CompressionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionType::None => "none",
            CompressionType::Gzip => "gzip",
            CompressionType::Lz4 => "lz4",
            CompressionType::Snappy => "snappy",
        }
    }

    /// Conventional file extension for objects written with this codec
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            CompressionType::None => None,
            CompressionType::Gzip => Some("gz"),
            CompressionType::Lz4 => Some("lz4"),
            CompressionType::Snappy => Some("sz"),
        }
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionType {
    type Err = WriterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(CompressionType::None),
            "gzip" | "gz" => Ok(CompressionType::Gzip),
            "lz4" => Ok(CompressionType::Lz4),
            "snappy" => Ok(CompressionType::Snappy),
            _ => Err(WriterError::UnsupportedCompression(s.to_string())),
        }
    }
}

/// Compression level (0-4)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum CompressionLevel {
    Fastest = 0,
    Fast = 1,
    #[default]
    Default = 2,
    Slow = 3,
    Slowest = 4,
}

impl CompressionLevel {
    pub fn to_gzip_level(self) -> u32 {
        match self {
            CompressionLevel::Fastest => 1,
            CompressionLevel::Fast => 3,
            CompressionLevel::Default => 6,
            CompressionLevel::Slow => 8,
            CompressionLevel::Slowest => 9,
        }
    }

    pub fn to_lz4_level(self) -> u32 {
        match self {
            CompressionLevel::Fastest => 1,
            CompressionLevel::Fast => 3,
            CompressionLevel::Default => 5,
            CompressionLevel::Slow => 9,
            CompressionLevel::Slowest => 12,
        }
    }
}

impl TryFrom<u8> for CompressionLevel {
    type Error = WriterError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CompressionLevel::Fastest),
            1 => Ok(CompressionLevel::Fast),
            2 => Ok(CompressionLevel::Default),
            3 => Ok(CompressionLevel::Slow),
            4 => Ok(CompressionLevel::Slowest),
            other => Err(WriterError::InvalidCompressionLevel(other)),
        }
    }
}

enum Encoder {
    Gzip(flate2::write::GzEncoder<LayerHandle>),
    Lz4(lz4::Encoder<LayerHandle>),
    Snappy(snap::write::FrameEncoder<LayerHandle>),
}

impl Encoder {
    fn as_writer(&mut self) -> &mut dyn Write {
        match self {
            Encoder::Gzip(encoder) => encoder,
            Encoder::Lz4(encoder) => encoder,
            Encoder::Snappy(encoder) => encoder,
        }
    }

    /// Emit the trailer without closing the wrapped layer
    fn finish(self) -> io::Result<()> {
        match self {
            Encoder::Gzip(mut encoder) => encoder.try_finish(),
            Encoder::Lz4(encoder) => {
                let (_downstream, result) = encoder.finish();
                result
            }
            // The snappy framing format has no trailer
            Encoder::Snappy(mut encoder) => encoder.flush(),
        }
    }
}

/// Writer layer that compresses everything written to it
pub struct CodecLayer {
    compression: CompressionType,
    encoder: Option<Encoder>,
    bytes_in: u64,
}

impl CodecLayer {
    /// Wrap `downstream` with an encoder for `compression`
    ///
    /// Returns `None` for `CompressionType::None`: no layer is added and the
    /// downstream layer stays outermost.
    pub fn wrap(
        compression: CompressionType,
        level: CompressionLevel,
        downstream: LayerHandle,
    ) -> Result<Option<Self>, WriterError> {
        let encoder = match compression {
            CompressionType::None => return Ok(None),
            CompressionType::Gzip => Encoder::Gzip(flate2::write::GzEncoder::new(
                downstream,
                flate2::Compression::new(level.to_gzip_level()),
            )),
            CompressionType::Lz4 => {
                let encoder = lz4::EncoderBuilder::new()
                    .level(level.to_lz4_level())
                    .build(downstream)
                    .map_err(|source| WriterError::Construction {
                        kind: LayerKind::Codec,
                        name: "lz4",
                        source,
                    })?;
                Encoder::Lz4(encoder)
            }
            CompressionType::Snappy => Encoder::Snappy(snap::write::FrameEncoder::new(downstream)),
        };

        debug!("Created {} encoder ({:?})", compression, level);

        Ok(Some(Self {
            compression,
            encoder: Some(encoder),
            bytes_in: 0,
        }))
    }

    pub fn compression(&self) -> CompressionType {
        self.compression
    }

    fn encoder(&mut self) -> io::Result<&mut dyn Write> {
        match self.encoder.as_mut() {
            Some(encoder) => Ok(encoder.as_writer()),
            None => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("{} encoder is closed", self.compression),
            )),
        }
    }
}

impl WriterLayer for CodecLayer {
    fn name(&self) -> &'static str {
        self.compression.as_str()
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.encoder()?.write(buf)?;
        self.bytes_in += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder()?.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        match self.encoder.take() {
            Some(encoder) => {
                encoder.finish()?;
                debug!(
                    "Finished {} encoder after {} input bytes",
                    self.compression, self.bytes_in
                );
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::LayerStack;
    use std::io::Read;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct Captured {
        bytes: Arc<Mutex<Vec<u8>>>,
        closed: Arc<Mutex<bool>>,
    }

    struct VecSink(Captured);

    impl WriterLayer for VecSink {
        fn name(&self) -> &'static str {
            "vec"
        }

        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.bytes.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn close(&mut self) -> io::Result<()> {
            *self.0.closed.lock().unwrap() = true;
            Ok(())
        }
    }

    fn compress(compression: CompressionType, input: &[u8]) -> Vec<u8> {
        let captured = Captured::default();
        let mut stack = LayerStack::new();
        let sink = stack.push(LayerKind::Sink, VecSink(captured.clone()));
        if let Some(codec) = CodecLayer::wrap(compression, CompressionLevel::Default, sink).unwrap() {
            stack.push(LayerKind::Codec, codec);
        }
        for chunk in input.chunks(7) {
            stack.write(chunk).unwrap();
        }
        stack.close().unwrap();
        let bytes = captured.bytes.lock().unwrap().clone();
        bytes
    }

    fn sample() -> Vec<u8> {
        b"backup data, backup data, backup data ".repeat(64)
    }

    #[test]
    fn test_gzip_layer() {
        let encoded = compress(CompressionType::Gzip, &sample());
        let mut decoded = Vec::new();
        flate2::read::GzDecoder::new(&encoded[..])
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn test_lz4_layer() {
        let encoded = compress(CompressionType::Lz4, &sample());
        let mut decoded = Vec::new();
        lz4::Decoder::new(&encoded[..])
            .unwrap()
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn test_snappy_layer() {
        let encoded = compress(CompressionType::Snappy, &sample());
        let mut decoded = Vec::new();
        snap::read::FrameDecoder::new(&encoded[..])
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn test_none_adds_no_layer() {
        let mut stack = LayerStack::new();
        let sink = stack.push(LayerKind::Sink, VecSink(Captured::default()));
        let codec = CodecLayer::wrap(CompressionType::None, CompressionLevel::Default, sink).unwrap();
        assert!(codec.is_none());
        assert_eq!(compress(CompressionType::None, b"plain"), b"plain");
    }

    #[test]
    fn test_close_leaves_downstream_open() {
        let captured = Captured::default();
        let mut stack = LayerStack::new();
        let sink = stack.push(LayerKind::Sink, VecSink(captured.clone()));
        let mut codec = CodecLayer::wrap(CompressionType::Gzip, CompressionLevel::Fast, sink)
            .unwrap()
            .unwrap();

        codec.write(b"hello").unwrap();
        codec.close().unwrap();

        assert!(!*captured.closed.lock().unwrap());
        assert!(!captured.bytes.lock().unwrap().is_empty());

        let err = codec.write(b"more").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_compression_type_from_str() {
        assert_eq!("gzip".parse::<CompressionType>().unwrap(), CompressionType::Gzip);
        assert_eq!("LZ4".parse::<CompressionType>().unwrap(), CompressionType::Lz4);
        assert_eq!("snappy".parse::<CompressionType>().unwrap(), CompressionType::Snappy);
        assert_eq!("none".parse::<CompressionType>().unwrap(), CompressionType::None);
        assert!(matches!(
            "zstd".parse::<CompressionType>(),
            Err(WriterError::UnsupportedCompression(name)) if name == "zstd"
        ));
    }

    #[test]
    fn test_compression_level_from_u8() {
        assert_eq!(CompressionLevel::try_from(0).unwrap(), CompressionLevel::Fastest);
        assert_eq!(CompressionLevel::try_from(4).unwrap(), CompressionLevel::Slowest);
        assert!(CompressionLevel::try_from(5).is_err());
        assert_eq!(CompressionLevel::Slowest.to_gzip_level(), 9);
    }
}
