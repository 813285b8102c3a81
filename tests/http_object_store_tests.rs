// HTTP object store integration tests
//
// These need a running object store speaking `PUT {url}/{bucket}/{key}`:
//
//   OBJECT_STORE_TEST_URL=http://localhost:9000 cargo test --test http_object_store_tests
//
// Without OBJECT_STORE_TEST_URL every test returns early.

use backup_writer::config::ObjectStoreConfig;
use backup_writer::{
    BackupWriter, Cipher, CompressionType, Destination, HttpObjectStore, ObjectStoreClient,
    ObjectStoreSession,
};
use std::io::Write;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn test_config() -> Option<ObjectStoreConfig> {
    let url = std::env::var("OBJECT_STORE_TEST_URL").ok()?;
    Some(ObjectStoreConfig {
        url,
        bucket: std::env::var("OBJECT_STORE_TEST_BUCKET")
            .unwrap_or_else(|_| "backup-writer-tests".to_string()),
        api_token: std::env::var("OBJECT_STORE_API_TOKEN").ok(),
        ..ObjectStoreConfig::default()
    })
}

#[test]
fn test_http_upload() {
    let Some(config) = test_config() else {
        eprintln!("OBJECT_STORE_TEST_URL not set, skipping");
        return;
    };

    let runtime = Runtime::new().unwrap();
    let client = Arc::new(HttpObjectStore::new(&config).unwrap());
    runtime.block_on(client.initialize(&config.bucket)).unwrap();

    let session = ObjectStoreSession::new(client, runtime.handle().clone()).unwrap();
    let destination = Destination::object_store(config.bucket.clone(), session);

    let name = format!("it-{}.gz", chrono::Utc::now().timestamp_millis());
    let mut writer =
        BackupWriter::open(&name, &destination, CompressionType::Gzip, Cipher::NoCipher).unwrap();
    for _ in 0..1000 {
        writer.write_all(b"integration test payload\n").unwrap();
    }
    writer.close().unwrap();
}

#[test]
fn test_http_unreachable_store_fails_on_close() {
    if test_config().is_none() {
        eprintln!("OBJECT_STORE_TEST_URL not set, skipping");
        return;
    }

    // Nothing listens on port 9 (discard) in the test environment
    let config = ObjectStoreConfig {
        url: "http://127.0.0.1:9".to_string(),
        timeout_seconds: 5,
        ..ObjectStoreConfig::default()
    };

    let runtime = Runtime::new().unwrap();
    let client = Arc::new(HttpObjectStore::new(&config).unwrap());
    let session = ObjectStoreSession::new(client, runtime.handle().clone()).unwrap();
    let destination = Destination::object_store("unreachable", session);

    let mut writer =
        BackupWriter::open("lost.bin", &destination, CompressionType::None, Cipher::NoCipher)
            .unwrap();
    // Writes may already fail once the request is gone
    let _ = writer.write_all(b"payload");

    let err = writer.close().unwrap_err();
    assert!(err.is_upload());
}
