mod commands;
mod config;

use std::sync::Arc;

use backup_store_s3::S3ObjectStore;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{Command, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the JSON result.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();

    info!("Object store: {}", config.store.endpoint);
    info!("  Bucket: {}", config.store.bucket);

    let store = Arc::new(S3ObjectStore::from_config(&config.store));

    let output = match &config.command {
        Command::List { grouped } => commands::list(&*store, *grouped).await?,
        Command::Restore { key, target_name } => {
            let restored =
                commands::restore(store, &config.source_dir, key, target_name.as_deref()).await?;
            serde_json::to_value(restored)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
