//! Example demonstrating settings refreshed periodically from a database table.
//!
//! An in-memory table stands in for the database. Its rows change while the
//! program runs, and the typed configuration follows along.

use async_trait::async_trait;
use parking_lot::RwLock;
use periodic_config::prelude::*;
use periodic_config::sources::{ConfigurationRecord, RecordSource, RecordStore};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize, Clone)]
struct AppConfig {
    server: ServerConfig,
    features: FeaturesConfig,
}

#[derive(Debug, Deserialize, Clone)]
struct ServerConfig {
    port: u16,
    host: String,
}

#[derive(Debug, Deserialize, Clone)]
struct FeaturesConfig {
    enable_caching: bool,
    max_upload_mb: u32,
}

/// A settings table shared with the "admin" task below.
#[derive(Clone, Default)]
struct SettingsTable {
    rows: Arc<RwLock<Vec<ConfigurationRecord>>>,
}

impl SettingsTable {
    fn upsert(&self, id: &str, value: &str) {
        let mut rows = self.rows.write();
        match rows.iter_mut().find(|row| row.id == id) {
            Some(row) => row.value = Some(value.to_string()),
            None => rows.push(ConfigurationRecord::new(id, value)),
        }
    }
}

#[async_trait]
impl RecordStore for SettingsTable {
    type Record = ConfigurationRecord;

    async fn load_records(&self, _cancel: &CancellationToken) -> Result<Vec<ConfigurationRecord>> {
        // Simulate query latency
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(self.rows.read().clone())
    }

    fn name(&self) -> String {
        "settings_table".to_string()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Database Configuration Example ===\n");

    let temp_dir = tempfile::tempdir()?;
    let defaults = temp_dir.path().join("default.yaml");
    std::fs::write(
        &defaults,
        r#"
server:
  port: 8080
  host: "localhost"

features:
  enable_caching: false
  max_upload_mb: 10
"#,
    )?;

    let table = SettingsTable::default();
    table.upsert("features.enable_caching", "true");

    // Refresh every second so the demo finishes quickly
    let settings = PeriodicLayer::register(
        "settings",
        RecordSource::new(table.clone()),
        Duration::from_secs(1),
    )
    .await?;

    let config = Composition::new()
        .with_file(&defaults)
        .with_layer(settings.clone())
        .bind::<AppConfig>()?;

    let _subscription = config.subscribe(|| {
        println!("  -> configuration rebuilt");
    });

    let current = config.get();
    println!("Initial configuration:");
    println!("  server: {}:{}", current.server.host, current.server.port);
    println!("  caching: {}", current.features.enable_caching);
    println!("  max upload: {} MB\n", current.features.max_upload_mb);

    println!("Updating the settings table...");
    table.upsert("features.max_upload_mb", "250");
    table.upsert("server.port", "9090");

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let current = config.get();
    println!("\nAfter the next refresh:");
    println!("  server: {}:{}", current.server.host, current.server.port);
    println!("  max upload: {} MB", current.features.max_upload_mb);

    let status = settings.status();
    println!(
        "\nRefresher status: {:?}, {} attempts, {} failures",
        status.state, status.attempts, status.failures
    );

    settings.shutdown().await;
    println!("\n✓ Example completed");
    Ok(())
}
