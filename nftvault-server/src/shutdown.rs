//! Signal handling for graceful shutdown and background task lifecycle.

use nftvault_core::storage::PgKvStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::Notify;

/// Creates a future that completes when a shutdown signal is received.
///
/// Listens for SIGTERM and SIGINT (Ctrl+C). If a handler cannot be
/// installed the other one is still awaited.
pub async fn shutdown_signal() {
    let sigterm = signal(SignalKind::terminate())
        .inspect_err(|e| tracing::error!(error = %e, "Failed to install SIGTERM handler"))
        .ok();
    let sigint = signal(SignalKind::interrupt())
        .inspect_err(|e| tracing::error!(error = %e, "Failed to install SIGINT handler"))
        .ok();

    let terminate = async {
        match sigterm {
            Some(mut sigterm) => {
                sigterm.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    };
    let interrupt = async {
        match sigint {
            Some(mut sigint) => {
                sigint.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = interrupt => {
            tracing::info!("Received SIGINT, initiating graceful shutdown");
        }
    }
}

/// Spawns a task that periodically deletes expired rows from the Postgres
/// key-value table.
///
/// Returns a Notify that stops the task.
pub fn spawn_purge_task(store: PgKvStore, every: Duration) -> Arc<Notify> {
    let shutdown_notify = Arc::new(Notify::new());
    let shutdown_notify_clone = shutdown_notify.clone();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match store.purge_expired().await {
                        Ok(0) => {}
                        Ok(purged) => tracing::debug!(purged, "Purged expired records"),
                        Err(e) => tracing::warn!(error = %e, "Failed to purge expired records"),
                    }
                }
                _ = shutdown_notify_clone.notified() => {
                    tracing::debug!("Purge task shutting down");
                    break;
                }
            }
        }
    });

    shutdown_notify
}
