//! Outbox relay binary
//!
//! Starts the dispatcher against the configured outbox store.

use tracing::{error, info, warn};

use domain_outbox::TracingPublisher;
use interface_relay::{init_tracing, OutboxServices, RelayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = RelayConfig::from_env()?;
    init_tracing(&config.log_level, config.log_format)?;

    info!(
        backend = ?config.backend,
        worker_id = %config.worker_id,
        batch_size = config.batch_size,
        lease_secs = config.lease_secs,
        "Starting outbox relay"
    );

    let services = OutboxServices::build(&config).await?;

    let health = services.health().await;
    if health.is_healthy() {
        info!(latency_ms = health.latency_ms, "Outbox store healthy");
    } else {
        warn!(message = ?health.message, "Outbox store reported unhealthy at startup");
    }

    let dispatcher = services.dispatcher(TracingPublisher, &config);
    let report = dispatcher.run_until(shutdown_signal()).await;

    info!(
        claimed = report.claimed,
        sent = report.sent,
        failed = report.failed,
        requeued = report.requeued,
        released = report.released,
        "Outbox relay stopped"
    );

    services.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
