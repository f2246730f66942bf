//! Example demonstrating configuration refreshed periodically over HTTP.
//!
//! The endpoint below is a placeholder. The layer is started in the
//! background so the program keeps running on local defaults while the
//! endpoint is unreachable.

use periodic_config::core::StartupPolicy;
use periodic_config::prelude::*;
use periodic_config::sources::HttpSource;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
struct AppConfig {
    server: ServerConfig,
    database: DatabaseConfig,
}

#[derive(Debug, Deserialize, Clone)]
struct ServerConfig {
    port: u16,
    host: String,
}

#[derive(Debug, Deserialize, Clone)]
struct DatabaseConfig {
    url: String,
    max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Remote Configuration Example ===\n");

    // Replace with your config server URL
    let http_source = HttpSource::builder()
        .with_url("https://config.example.com/api/config")
        .with_auth_token("your-secret-token")
        .with_timeout(Duration::from_secs(5))
        .build()?;

    let remote = PeriodicLayer::builder("remote", http_source)
        .with_period(Duration::from_secs(30))
        .with_startup_policy(StartupPolicy::Background)
        .with_failure_observer(|id, err| {
            eprintln!("  [{}] refresh failed: {}", id, err);
        })
        .build()
        .await?;

    let temp_dir = tempfile::tempdir()?;
    let defaults = temp_dir.path().join("default.yaml");
    std::fs::write(
        &defaults,
        r#"
server:
  port: 8080
  host: "localhost"

database:
  url: "postgresql://localhost/mydb"
  max_connections: 10
"#,
    )?;

    let composition = Composition::new()
        .with_file(&defaults) // Priority 100
        .with_layer(remote.clone()) // Priority 250
        .with_env("APP", "__"); // Priority 300

    println!("Layers in merge order:");
    for name in composition.layer_names() {
        println!("  {}", name);
    }
    println!();

    let config = composition.bind::<AppConfig>()?;

    // Give the first fetch a chance to finish
    remote.wait_for_attempts(1).await;

    let cfg = config.get();
    println!("Server: {}:{}", cfg.server.host, cfg.server.port);
    println!(
        "Database: {} (max {} connections)",
        cfg.database.url, cfg.database.max_connections
    );
    println!();

    let status = remote.status();
    match status.last_error {
        Some(err) => println!("Remote layer has no snapshot yet: {}", err),
        None => println!("Remote layer serving {} keys", remote.snapshot().map_or(0, |s| s.len())),
    }

    println!();
    println!("Try overriding with environment variables:");
    println!("  export APP_SERVER__PORT=9090");

    remote.shutdown().await;
    Ok(())
}
