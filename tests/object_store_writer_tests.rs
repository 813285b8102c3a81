// Object store destination integration tests
//
// Writers block on the pipe and on the upload join, so every test drives
// them from a plain test thread with its own runtime.

use anyhow::{bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use backup_writer::config::{DestinationConfig, ObjectStoreConfig};
use backup_writer::storage::UploadBody;
use backup_writer::{
    BackupWriter, Cipher, CompressionType, Destination, DestinationFactory, MemoryObjectStore,
    ObjectStoreClient, ObjectStoreSession, WriterError,
};
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::Notify;

const BUCKET: &str = "backups";

fn memory_destination(runtime: &Runtime, store: &Arc<MemoryObjectStore>) -> Destination {
    let session = ObjectStoreSession::new(store.clone(), runtime.handle().clone()).unwrap();
    Destination::object_store(BUCKET, session)
}

/// Client that finishes reading, then takes a while before committing
struct SlowStore {
    delay: Duration,
    committed: std::sync::Mutex<Option<Bytes>>,
}

#[async_trait]
impl ObjectStoreClient for SlowStore {
    async fn put_object(&self, _bucket: &str, _key: &str, body: UploadBody) -> Result<()> {
        let data = body.read_to_end().await?;
        tokio::time::sleep(self.delay).await;
        if let Ok(mut committed) = self.committed.lock() {
            *committed = Some(data);
        }
        Ok(())
    }

    fn client_type(&self) -> &str {
        "slow"
    }
}

/// Client that consumes the whole body and then rejects it
struct RejectingStore;

#[async_trait]
impl ObjectStoreClient for RejectingStore {
    async fn put_object(&self, _bucket: &str, key: &str, body: UploadBody) -> Result<()> {
        body.read_to_end().await?;
        bail!("permission denied for '{}'", key)
    }

    fn client_type(&self) -> &str {
        "rejecting"
    }
}

/// Client that fails before reading anything
struct UnreachableStore;

#[async_trait]
impl ObjectStoreClient for UnreachableStore {
    async fn put_object(&self, _bucket: &str, _key: &str, _body: UploadBody) -> Result<()> {
        bail!("connection refused")
    }

    fn client_type(&self) -> &str {
        "unreachable"
    }
}

/// Client that does not start reading until the gate opens
struct GatedStore {
    gate: Arc<Notify>,
    inner: MemoryObjectStore,
}

#[async_trait]
impl ObjectStoreClient for GatedStore {
    async fn put_object(&self, bucket: &str, key: &str, body: UploadBody) -> Result<()> {
        self.gate.notified().await;
        self.inner.put_object(bucket, key, body).await
    }

    fn client_type(&self) -> &str {
        "gated"
    }
}

/// Memory store that reports every upload outcome
struct ReportingStore {
    inner: MemoryObjectStore,
    outcomes: std::sync::Mutex<mpsc::Sender<bool>>,
}

#[async_trait]
impl ObjectStoreClient for ReportingStore {
    async fn put_object(&self, bucket: &str, key: &str, body: UploadBody) -> Result<()> {
        let result = self.inner.put_object(bucket, key, body).await;
        if let Ok(outcomes) = self.outcomes.lock() {
            let _ = outcomes.send(result.is_ok());
        }
        result
    }

    fn client_type(&self) -> &str {
        "reporting"
    }
}

#[test]
fn test_upload_uncompressed() {
    let runtime = Runtime::new().unwrap();
    let store = Arc::new(MemoryObjectStore::new());
    let destination = memory_destination(&runtime, &store);

    let mut writer =
        BackupWriter::open("hello.txt", &destination, CompressionType::None, Cipher::NoCipher)
            .unwrap();
    writer.write_all(b"hello world").unwrap();
    writer.close().unwrap();

    assert_eq!(&store.get(BUCKET, "hello.txt").unwrap()[..], b"hello world");
    assert_eq!(store.len(), 1);
}

#[test]
fn test_upload_gzip_in_small_chunks() {
    let runtime = Runtime::new().unwrap();
    let store = Arc::new(MemoryObjectStore::new());
    let destination = memory_destination(&runtime, &store).with_pipe(2, 16);
    let data: Vec<u8> = (0..50_000u32).map(|i| (i % 97) as u8).collect();

    let mut writer =
        BackupWriter::open("data.gz", &destination, CompressionType::Gzip, Cipher::NoCipher)
            .unwrap();
    for chunk in data.chunks(1000) {
        writer.write_all(chunk).unwrap();
    }
    writer.close().unwrap();

    let object = store.get(BUCKET, "data.gz").unwrap();
    let mut decoded = Vec::new();
    flate2::read::GzDecoder::new(&object[..])
        .read_to_end(&mut decoded)
        .unwrap();
    assert_eq!(decoded, data);
}

#[test]
fn test_close_waits_for_upload() {
    let runtime = Runtime::new().unwrap();
    let store = Arc::new(SlowStore {
        delay: Duration::from_millis(300),
        committed: std::sync::Mutex::new(None),
    });
    let session = ObjectStoreSession::new(store.clone(), runtime.handle().clone()).unwrap();
    let destination = Destination::object_store(BUCKET, session);

    let mut writer =
        BackupWriter::open("slow.lz4", &destination, CompressionType::Lz4, Cipher::NoCipher)
            .unwrap();
    writer.write_all(b"patience").unwrap();
    writer.close().unwrap();

    // Committed by the time close returns, no polling
    let committed = store.committed.lock().unwrap().clone();
    let mut decoded = Vec::new();
    lz4::Decoder::new(&committed.expect("object should be committed")[..])
        .unwrap()
        .read_to_end(&mut decoded)
        .unwrap();
    assert_eq!(decoded, b"patience");
}

#[test]
fn test_upload_failure_is_reported_by_close() {
    let runtime = Runtime::new().unwrap();
    let session =
        ObjectStoreSession::new(Arc::new(RejectingStore), runtime.handle().clone()).unwrap();
    let destination = Destination::object_store(BUCKET, session);

    let mut writer =
        BackupWriter::open("denied.gz", &destination, CompressionType::Gzip, Cipher::NoCipher)
            .unwrap();
    writer.write_all(b"secret").unwrap();

    let err = writer.close().unwrap_err();
    assert!(err.is_upload());
    assert!(err.to_string().contains("denied.gz"));
    assert!(matches!(writer.close(), Err(WriterError::Closed)));
}

#[test]
fn test_upload_failure_surfaces_on_write_and_close() {
    let runtime = Runtime::new().unwrap();
    let session =
        ObjectStoreSession::new(Arc::new(UnreachableStore), runtime.handle().clone()).unwrap();
    let destination = Destination::object_store(BUCKET, session).with_pipe(1, 4);

    let mut writer =
        BackupWriter::open("lost.bin", &destination, CompressionType::None, Cipher::NoCipher)
            .unwrap();

    let mut write_error = None;
    for _ in 0..500 {
        match writer.write(b"data") {
            Ok(_) => std::thread::sleep(Duration::from_millis(10)),
            Err(e) => {
                write_error = Some(e);
                break;
            }
        }
    }
    let write_error = write_error.expect("writes should fail once the upload is gone");
    assert_eq!(write_error.kind(), io::ErrorKind::BrokenPipe);

    // Closing the pipe fails too, and the upload error is attached
    let err = writer.close().unwrap_err();
    assert!(matches!(err, WriterError::Multiple { .. }));
    assert!(err.is_upload());
}

#[test]
fn test_slow_reader_applies_backpressure() {
    let runtime = Runtime::new().unwrap();
    let gate = Arc::new(Notify::new());
    let store = Arc::new(GatedStore {
        gate: gate.clone(),
        inner: MemoryObjectStore::new(),
    });
    let session = ObjectStoreSession::new(store.clone(), runtime.handle().clone()).unwrap();
    let destination = Destination::object_store(BUCKET, session).with_pipe(1, 4);

    let released = Arc::new(AtomicBool::new(false));
    let writer_released = released.clone();

    let writer_thread = std::thread::spawn(move || {
        let mut writer =
            BackupWriter::open("gated.bin", &destination, CompressionType::None, Cipher::NoCipher)
                .unwrap();
        writer.write_all(&[7u8; 64]).unwrap();
        let finished_after_release = writer_released.load(Ordering::SeqCst);
        writer.close().unwrap();
        finished_after_release
    });

    std::thread::sleep(Duration::from_millis(200));
    released.store(true, Ordering::SeqCst);
    gate.notify_one();

    let finished_after_release = writer_thread.join().unwrap();
    assert!(
        finished_after_release,
        "writes should block while the uploader is not reading"
    );
    assert_eq!(&store.inner.get(BUCKET, "gated.bin").unwrap()[..], &[7u8; 64][..]);
}

#[test]
fn test_dropped_writer_commits_nothing() {
    let runtime = Runtime::new().unwrap();
    let (tx, rx) = mpsc::channel();
    let store = Arc::new(ReportingStore {
        inner: MemoryObjectStore::new(),
        outcomes: std::sync::Mutex::new(tx),
    });
    let session = ObjectStoreSession::new(store.clone(), runtime.handle().clone()).unwrap();
    let destination = Destination::object_store(BUCKET, session);

    {
        let mut writer =
            BackupWriter::open("partial.gz", &destination, CompressionType::Gzip, Cipher::NoCipher)
                .unwrap();
        writer.write_all(b"never finished").unwrap();
    }

    let succeeded = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(!succeeded);
    assert!(store.inner.is_empty());
}

#[test]
fn test_current_thread_runtime_is_rejected() {
    // Nothing would drive an upload spawned on this runtime while close blocks
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let store = Arc::new(MemoryObjectStore::new());

    let result = ObjectStoreSession::new(store.clone(), runtime.handle().clone());
    assert!(matches!(result, Err(WriterError::Session(_))));

    let config = DestinationConfig {
        kind: "object-store".to_string(),
        filesystem: None,
        object_store: Some(ObjectStoreConfig::default()),
    };
    let result =
        DestinationFactory::create_with_client(&config, store.clone(), runtime.handle().clone());
    assert!(matches!(result, Err(WriterError::Session(_))));
    assert!(store.is_empty());
}

#[test]
fn test_write_after_close_fails() {
    let runtime = Runtime::new().unwrap();
    let store = Arc::new(MemoryObjectStore::new());
    let destination = memory_destination(&runtime, &store);

    let mut writer =
        BackupWriter::open("done.bin", &destination, CompressionType::None, Cipher::NoCipher)
            .unwrap();
    writer.write_all(b"done").unwrap();
    writer.close().unwrap();

    let err = writer.write(b"late").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    assert_eq!(&store.get(BUCKET, "done.bin").unwrap()[..], b"done");
}

#[test]
fn test_invalid_pipe_sizing() {
    let runtime = Runtime::new().unwrap();
    let store = Arc::new(MemoryObjectStore::new());
    let destination = memory_destination(&runtime, &store).with_pipe(0, 1024);

    let result =
        BackupWriter::open("x", &destination, CompressionType::None, Cipher::NoCipher);
    assert!(matches!(result, Err(WriterError::Configuration(_))));
}

#[test]
fn test_factory_with_client() {
    let runtime = Runtime::new().unwrap();
    let store = Arc::new(MemoryObjectStore::new());
    let config = DestinationConfig {
        kind: "s3".to_string(),
        filesystem: None,
        object_store: Some(ObjectStoreConfig {
            bucket: "nightly".to_string(),
            chunk_size_bytes: 8,
            ..ObjectStoreConfig::default()
        }),
    };

    let destination =
        DestinationFactory::create_with_client(&config, store.clone(), runtime.handle().clone())
            .unwrap();

    let mut writer =
        BackupWriter::open("db.snappy", &destination, CompressionType::Snappy, Cipher::NoCipher)
            .unwrap();
    writer.write_all(b"snapshot contents").unwrap();
    writer.close().unwrap();

    let object = store.get("nightly", "db.snappy").unwrap();
    let mut decoded = Vec::new();
    snap::read::FrameDecoder::new(&object[..])
        .read_to_end(&mut decoded)
        .unwrap();
    assert_eq!(decoded, b"snapshot contents");
}
