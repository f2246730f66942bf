//! Integration tests for periodic layers inside a layered composition.

#![allow(unsafe_code)] // For env var manipulation in tests

use async_trait::async_trait;
use periodic_config::core::StartupPolicy;
use periodic_config::prelude::*;
use periodic_config::sources::{ConfigurationRecord, FnSource, RecordSource, RecordStore};
use serde::Deserialize;
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize, Clone, PartialEq)]
struct ServerConfig {
    port: u16,
    host: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
struct FeatureConfig {
    enable_caching: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
struct AppConfig {
    server: ServerConfig,
    features: FeatureConfig,
}

/// A settings table whose rows change on every call.
struct RotatingTable {
    versions: Vec<Vec<ConfigurationRecord>>,
    calls: AtomicUsize,
}

impl RotatingTable {
    fn new(versions: Vec<Vec<ConfigurationRecord>>) -> Self {
        Self {
            versions,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RecordStore for RotatingTable {
    type Record = ConfigurationRecord;

    async fn load_records(&self, _cancel: &CancellationToken) -> Result<Vec<ConfigurationRecord>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let index = call.min(self.versions.len() - 1);
        Ok(self.versions[index].clone())
    }

    fn name(&self) -> String {
        "rotating".to_string()
    }
}

fn write_defaults(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("default.yaml");
    fs::write(
        &path,
        r#"
server:
  port: 7000
  host: localhost
features:
  enable_caching: false
"#,
    )
    .unwrap();
    path
}

#[tokio::test(start_paused = true)]
async fn test_periodic_layer_overrides_file() {
    let temp_dir = TempDir::new().unwrap();
    let defaults = write_defaults(&temp_dir);

    let table = RotatingTable::new(vec![vec![
        ConfigurationRecord::new("server.port", "8080"),
        ConfigurationRecord::new("features.enable_caching", "true"),
    ]]);
    let settings = PeriodicLayer::register(
        "settings",
        RecordSource::new(table),
        Duration::from_secs(300),
    )
    .await
    .unwrap();

    let composition = Composition::new()
        .with_file(&defaults)
        .with_layer(settings.clone());

    let config: AppConfig = composition.load().unwrap();
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.host, "localhost");
    assert!(config.features.enable_caching);

    assert_eq!(
        composition.get("server.host").unwrap().as_deref(),
        Some("localhost")
    );

    settings.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_bound_config_follows_refreshes() {
    let temp_dir = TempDir::new().unwrap();
    let defaults = write_defaults(&temp_dir);

    let table = RotatingTable::new(vec![
        vec![ConfigurationRecord::new("server.port", "8080")],
        vec![ConfigurationRecord::new("server.port", "9090")],
    ]);
    let settings = PeriodicLayer::register(
        "settings",
        RecordSource::new(table),
        Duration::from_millis(100),
    )
    .await
    .unwrap();

    let config = Composition::new()
        .with_file(&defaults)
        .with_layer(settings.clone())
        .bind::<AppConfig>()
        .unwrap();
    assert_eq!(config.get().server.port, 8080);

    let rebuilds = Arc::new(AtomicUsize::new(0));
    let rebuilds_clone = Arc::clone(&rebuilds);
    let _subscription = config.subscribe(move || {
        rebuilds_clone.fetch_add(1, Ordering::SeqCst);
    });

    settings.wait_for_attempts(2).await;
    assert_eq!(config.get().server.port, 9090);
    assert_eq!(config.get().server.host, "localhost");
    assert_eq!(rebuilds.load(Ordering::SeqCst), 1);

    settings.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_bound_config_keeps_value_when_rebuild_fails() {
    let temp_dir = TempDir::new().unwrap();
    let defaults = write_defaults(&temp_dir);

    let table = RotatingTable::new(vec![
        vec![ConfigurationRecord::new("server.port", "8080")],
        vec![ConfigurationRecord::new("server.port", "not-a-port")],
    ]);
    let settings = PeriodicLayer::register(
        "settings",
        RecordSource::new(table),
        Duration::from_millis(100),
    )
    .await
    .unwrap();

    let config = Composition::new()
        .with_file(&defaults)
        .with_layer(settings.clone())
        .bind::<AppConfig>()
        .unwrap();

    settings.wait_for_attempts(2).await;

    // The layer accepted the snapshot, but the typed view could not be rebuilt
    assert_eq!(settings.get("server.port").as_deref(), Some("not-a-port"));
    assert_eq!(config.get().server.port, 8080);
    assert!(config.reload().is_err());

    settings.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_empty_background_layer_falls_through() {
    let temp_dir = TempDir::new().unwrap();
    let defaults = write_defaults(&temp_dir);

    let settings = PeriodicLayer::builder(
        "offline",
        FnSource::new("offline", |_cancel| async {
            Err(ConfigError::unavailable("database offline"))
        }),
    )
    .with_startup_policy(StartupPolicy::Background)
    .build()
    .await
    .unwrap();

    let config: AppConfig = Composition::new()
        .with_file(&defaults)
        .with_layer(settings.clone())
        .load()
        .unwrap();

    assert_eq!(config.server.port, 7000);
    settings.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_env_overrides_periodic_layer() {
    let temp_dir = TempDir::new().unwrap();
    let defaults = write_defaults(&temp_dir);

    unsafe {
        std::env::set_var("PERIODIC_CONFIG_IT_SERVER__PORT", "9999");
    }

    let table = RotatingTable::new(vec![vec![ConfigurationRecord::new("server.port", "8080")]]);
    let settings = PeriodicLayer::register(
        "settings",
        RecordSource::new(table),
        Duration::from_secs(300),
    )
    .await
    .unwrap();

    let composition = Composition::new()
        .with_file(&defaults)
        .with_layer(settings.clone())
        .with_env("PERIODIC_CONFIG_IT", "__");

    let config: AppConfig = composition.load().unwrap();
    assert_eq!(config.server.port, 9999);
    assert_eq!(config.server.host, "localhost");

    unsafe {
        std::env::remove_var("PERIODIC_CONFIG_IT_SERVER__PORT");
    }
    settings.shutdown().await;
}

#[tokio::test]
async fn test_layer_names_in_merge_order() {
    let temp_dir = TempDir::new().unwrap();
    let defaults = write_defaults(&temp_dir);

    let table = RotatingTable::new(vec![vec![]]);
    let settings = PeriodicLayer::register(
        "settings",
        RecordSource::new(table),
        Duration::from_secs(300),
    )
    .await
    .unwrap();

    let composition = Composition::new()
        .with_env("APP", "__")
        .with_layer(settings.clone())
        .with_file(&defaults);

    let names = composition.layer_names();
    assert!(names[0].starts_with("file:"));
    assert_eq!(names[1], "periodic:settings");
    assert_eq!(names[2], "env:APP*");

    settings.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_colon_and_invalid_keys_do_not_break_merge() {
    let temp_dir = TempDir::new().unwrap();
    let defaults = write_defaults(&temp_dir);

    let table = RotatingTable::new(vec![vec![
        ConfigurationRecord::new("server:port", "8080"),
        ConfigurationRecord::new("features:enable_caching", "true"),
        ConfigurationRecord::new("not a path!", "ignored"),
    ]]);
    let settings = PeriodicLayer::register(
        "settings",
        RecordSource::new(table),
        Duration::from_secs(300),
    )
    .await
    .unwrap();

    let composition = Composition::new()
        .with_file(&defaults)
        .with_layer(settings.clone());

    let config: AppConfig = composition.load().unwrap();
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.host, "localhost");
    assert!(config.features.enable_caching);
    assert_eq!(
        composition.get("server.port").unwrap().as_deref(),
        Some("8080")
    );

    // The layer itself still answers with the stored keys
    assert_eq!(settings.get("server:port").as_deref(), Some("8080"));
    assert_eq!(settings.get("not a path!").as_deref(), Some("ignored"));

    settings.shutdown().await;
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
struct Generations {
    left: u64,
    right: u64,
}

fn counting_source(key: &'static str) -> FnSource {
    let counter = Arc::new(AtomicU64::new(0));
    FnSource::new(key, move |_cancel| {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        async move { Ok([(key, n.to_string())].into_iter().collect::<Snapshot>()) }
    })
}

fn current_generation(layer: &PeriodicLayer, key: &str) -> u64 {
    layer.get(key).unwrap().parse().unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_bound_config_with_concurrently_refreshing_layers() {
    let left = PeriodicLayer::register("left", counting_source("left"), Duration::from_millis(5))
        .await
        .unwrap();
    let right = PeriodicLayer::register("right", counting_source("right"), Duration::from_millis(5))
        .await
        .unwrap();

    let composition = Composition::new()
        .with_layer(left.clone())
        .with_layer(right.clone());
    let config = composition.bind::<Generations>().unwrap();

    let rebuilds = Arc::new(AtomicUsize::new(0));
    let rebuilds_clone = Arc::clone(&rebuilds);
    let _subscription = config.subscribe(move || {
        rebuilds_clone.fetch_add(1, Ordering::SeqCst);
    });
    let swaps_before = left.status().successes + right.status().successes;

    tokio::join!(left.wait_for_attempts(30), right.wait_for_attempts(30));
    left.shutdown().await;
    right.shutdown().await;

    // Every swap after subscribing triggered a rebuild; at most one swap per
    // layer may have signalled just before the subscription existed
    let swaps_after = left.status().successes + right.status().successes - swaps_before;
    assert!(rebuilds.load(Ordering::SeqCst) as u64 >= swaps_after.saturating_sub(2));

    // The last rebuild saw the final snapshot of both layers
    let expected = Generations {
        left: current_generation(&left, "left"),
        right: current_generation(&right, "right"),
    };
    assert_eq!(*config.get(), expected);
    assert_eq!(composition.load::<Generations>().unwrap(), expected);
}
