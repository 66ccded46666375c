use std::path::Path;

use cfgmgr::utils::file_io::open_file_for_append;
use cfgmgr::DaemonBuilder;
use cfgmgr::Error;
use cfgmgr::Result;
use cfgmgr::Settings;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let settings = Settings::load(None)?.validate()?;

    // Initializing Logs
    let _guard = init_observability(&settings.storage.log_dir)?;

    // Initializing Shutdown Signal
    let shutdown = CancellationToken::new();

    let prometheus_enabled = settings.monitoring.prometheus_enabled;
    let daemon = DaemonBuilder::new(settings).build()?;
    if prometheus_enabled {
        daemon.start_metrics_server(shutdown.clone());
    }

    info!("cfgmgrd started. Waiting for shutdown signal...");
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = graceful_shutdown(signal_token).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    if let Err(e) = daemon.run(shutdown).await {
        error!("daemon stops: {:?}", e);
        return Err(e);
    }

    info!("Exiting program.");
    Ok(())
}

async fn graceful_shutdown(shutdown: CancellationToken) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| Error::SignalSenderClosed(format!("Failed to install SIGINT handler: {e}")))?;
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| Error::SignalSenderClosed(format!("Failed to install SIGTERM handler: {e}")))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    shutdown.cancel();
    info!("Shutdown requested, draining queued requests");
    Ok(())
}

fn init_observability(log_dir: &Path) -> Result<WorkerGuard> {
    let log_file = open_file_for_append(&log_dir.join("cfgmgrd.log"))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(EnvFilter::from_default_env());
    let console_layer = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(file_layer).with(console_layer).init();

    Ok(guard)
}
