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

// Filesystem sink implementation

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::WriterError;
use crate::layer::WriterLayer;

/// Sink writing a backup to a local file
pub struct FileSink {
    path: PathBuf,
    file: Option<BufWriter<File>>,
    bytes_written: u64,
}

impl FileSink {
    /// Create or truncate `base_path/name`
    ///
    /// With `create_dir` set, missing parent directories are created first.
    pub fn create(base_path: &Path, name: &str, create_dir: bool) -> Result<Self, WriterError> {
        let path = base_path.join(name);
        let create_error = |source| WriterError::DestinationCreate {
            path: path.display().to_string(),
            source,
        };

        if create_dir {
            if let Some(parent) = path.parent() {
                if !parent.exists() {
                    info!("Creating backup directory: {}", parent.display());
                    fs::create_dir_all(parent).map_err(create_error)?;
                }
            }
        }

        let file = File::create(&path).map_err(create_error)?;
        debug!("Created backup file {}", path.display());

        Ok(Self {
            path,
            file: Some(BufWriter::new(file)),
            bytes_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.file.as_mut().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("file {} is closed", self.path.display()),
            )
        })
    }
}

impl WriterLayer for FileSink {
    fn name(&self) -> &'static str {
        "file"
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.file()?.write(buf)?;
        self.bytes_written += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file()?.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        let Some(mut writer) = self.file.take() else {
            return Ok(());
        };
        writer.flush()?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        info!(
            "Successfully wrote {} bytes to {}",
            self.bytes_written,
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_and_close() {
        let temp_dir = TempDir::new().unwrap();
        let mut sink = FileSink::create(temp_dir.path(), "backup.dat", false).unwrap();

        sink.write(b"test data").unwrap();
        sink.close().unwrap();

        let written = std::fs::read(temp_dir.path().join("backup.dat")).unwrap();
        assert_eq!(written, b"test data");
        assert!(sink.write(b"more").is_err());
    }

    #[test]
    fn test_truncates_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("backup.dat");
        std::fs::write(&path, b"old contents that are longer").unwrap();

        let mut sink = FileSink::create(temp_dir.path(), "backup.dat", false).unwrap();
        sink.write(b"new").unwrap();
        sink.close().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn test_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("does/not/exist");

        let result = FileSink::create(&missing, "backup.dat", false);
        match result {
            Err(WriterError::DestinationCreate { path, source }) => {
                assert!(path.ends_with("backup.dat"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected missing directory to fail"),
        }
    }

    #[test]
    fn test_create_dir() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("nested");

        let mut sink = FileSink::create(&base, "2025/01/backup.dat", true).unwrap();
        sink.close().unwrap();

        assert!(base.join("2025/01/backup.dat").exists());
        assert_eq!(sink.path(), base.join("2025/01/backup.dat"));
    }
}
