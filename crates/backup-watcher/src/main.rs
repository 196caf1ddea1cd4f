use std::sync::Arc;

use backup_store_s3::S3ObjectStore;
use backup_watcher::{
    bootstrap, logging, AttemptJournal, BackupPipeline, Classifier, Config, Ledger,
    WatchOrchestrator,
};
use clap::Parser;
use tokio::signal;
use tokio::sync::watch as tokio_watch;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let log_file = logging::init(&config.log_dir, &config.log_level, config.log_console)?;

    info!("Starting backup-watcher");
    info!("  Watch directory: {}", config.watch_dir.display());
    info!("  Object store: {}", config.store.endpoint);
    info!("  Bucket: {}", config.store.bucket);
    info!("  Log file: {}", log_file.display());

    let store = Arc::new(S3ObjectStore::from_config(&config.store));
    bootstrap(&*store).await?;

    let ledger = Arc::new(Ledger::new());
    let journal = Arc::new(AttemptJournal::new(config.log_dir.clone()));
    let pipeline = BackupPipeline::new(store, ledger).with_journal(journal);
    let classifier = Classifier::new(config.classifier());

    let orchestrator = WatchOrchestrator::new(classifier, pipeline, usize::from(config.workers))
        .with_stats_file(config.stats_file.clone());

    let shutdown_rx = create_shutdown_signal();
    orchestrator.run(&config.watch_dir, shutdown_rx).await?;

    info!("Watcher stopped.");
    Ok(())
}

/// Create a shutdown signal that triggers on Ctrl+C or SIGTERM.
fn create_shutdown_signal() -> tokio_watch::Receiver<bool> {
    let (tx, rx) = tokio_watch::channel(false);

    tokio::spawn(async move {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
            info!("Received Ctrl+C, initiating shutdown");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
            info!("Received SIGTERM, initiating shutdown");
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }

        let _ = tx.send(true);
    });

    rx
}
