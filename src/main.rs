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

use anyhow::{Context, Result};
use backup_writer::config::{load_config_with_env, LoggingConfig};
use backup_writer::{BackupWriter, CompressionType, Destination, DestinationFactory};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Backup Writer - Stream data into a compressed backup object
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.yaml")]
    config: PathBuf,

    /// Backup object name (defaults to a timestamped name)
    #[arg(short, long)]
    name: Option<String>,

    /// File to back up (defaults to stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Compression type (overrides config file)
    #[arg(long)]
    compression: Option<CompressionType>,
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    // RUST_LOG takes precedence over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(logging.level.to_lowercase()))
        .context("Invalid logging.level")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    let result = match logging.format.as_str() {
        "compact" => builder.compact().try_init(),
        _ => builder.try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))
}

fn default_object_name(compression: CompressionType) -> String {
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
    match compression.extension() {
        Some(ext) => format!("backup-{}.{}", stamp, ext),
        None => format!("backup-{}", stamp),
    }
}

fn open_input(input: Option<&PathBuf>) -> Result<Box<dyn Read + Send>> {
    match input {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open input {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(io::stdin())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration from file
    let mut config = load_config_with_env(&args.config)?;

    // Apply CLI overrides
    if let Some(compression) = args.compression {
        config.writer.compression = compression.as_str().to_string();
    }

    init_tracing(&config.logging)?;

    let compression: CompressionType = config.writer.compression.parse()?;
    let name = args
        .name
        .clone()
        .unwrap_or_else(|| default_object_name(compression));

    info!("Starting Backup Writer");
    info!("Loaded configuration from: {:?}", args.config);
    info!("Destination: {}", config.destination.kind);
    info!("Object name: {}", name);

    let destination = DestinationFactory::create(&config.destination)?;

    if let Destination::ObjectStore(object_store) = &destination {
        object_store
            .session
            .client()
            .initialize(&object_store.bucket)
            .await
            .context("Failed to initialize object store bucket")?;
    }

    let input = open_input(args.input.as_ref())?;
    let settings = config.writer.clone();

    // Writer calls block on the pipe and the upload join
    let copied = tokio::task::spawn_blocking(move || -> Result<u64> {
        let mut input = input;
        let mut writer = BackupWriter::open_with_settings(&name, &destination, &settings)?;

        let copied = match io::copy(&mut input, &mut writer) {
            Ok(copied) => copied,
            Err(e) => {
                // Dropping the writer aborts the stack and the upload
                drop(writer);
                return Err(e).context("Failed to stream input into backup");
            }
        };

        writer.close()?;
        Ok(copied)
    })
    .await
    .context("Backup task panicked")?;

    match copied {
        Ok(bytes) => {
            info!("Backup complete: {} bytes written", bytes);
            Ok(())
        }
        Err(e) => {
            error!("Backup failed: {:#}", e);
            Err(e)
        }
    }
}
