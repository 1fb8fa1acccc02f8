use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use vehicle_digest_service::config::Settings;
use vehicle_digest_service::provider::ChannelFactory;
use vehicle_digest_service::server::{create_app, AppState};
use vehicle_digest_service::tasks::RetentionTask;
use vehicle_digest_service::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Guard flushes pending spans on exit
    let _telemetry = init_telemetry(&settings.otel)?;
    tracing::info!("Configuration loaded");

    // Logging transports until real SMTP/SMS/push clients are injected
    let state = AppState::new(settings.clone(), ChannelFactory::logging()).await?;
    tracing::info!(
        store = state.store.backend_type(),
        providers = state.registry.len(),
        "Application state initialized"
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Start digest scheduler in background
    let scheduler_handle = state.scheduler.spawn(shutdown_tx.subscribe());

    // Start retention task in background
    let retention_handle = if settings.retention.enabled {
        let task = RetentionTask::new(
            settings.retention.clone(),
            state.store.clone(),
            shutdown_tx.subscribe(),
        );
        Some(tokio::spawn(task.run()))
    } else {
        tracing::info!("Retention task disabled");
        None
    };

    let app = create_app(state);

    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_tx))
        .await?;

    // Scheduler returns only after any in-flight cycle has finished
    tracing::info!("Waiting for background tasks to finish...");
    let _ = scheduler_handle.await;
    if let Some(handle) = retention_handle {
        let _ = handle.await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    // Stop scheduler loop and retention task
    let _ = shutdown_tx.send(());
}
