use anyhow::{Context, Result};
use gridwatch::api::{self, AnomalyApiState, SettingsApiState};
use gridwatch::config::{load_config, GridwatchConfig};
use gridwatch::detector::{spawn_dispatcher, Orchestrator};
use gridwatch::nats::NatsClient;
use gridwatch::settings::{new_shared_settings, AnomalySettings, SettingsStore};
use gridwatch::{alert::AlertPublisher, store::AnomalyStore};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gridwatch=info".into()),
        )
        .init();

    info!("Gridwatch starting...");

    let config_path =
        std::env::var("GRIDWATCH_CONFIG").unwrap_or_else(|_| "gridwatch.toml".to_string());
    let config = if std::path::Path::new(&config_path).exists() {
        load_config(&config_path)
            .map_err(|e| anyhow::anyhow!("Failed to load config '{}': {}", config_path, e))?
    } else {
        warn!(path = %config_path, "No config file found, using defaults");
        GridwatchConfig::default()
    };

    // Transport + storage bootstrap; unreachable collaborators are fatal
    let nats = NatsClient::connect(&config.nats)
        .await
        .context("Startup failed: NATS unreachable")?;

    // Settings: load the stored blob (or defaults) into the shared cell
    let settings_cell = new_shared_settings(AnomalySettings::default());
    let settings_store = SettingsStore::new(
        nats.kv().clone(),
        config.nats.settings_key.clone(),
        settings_cell.clone(),
    );
    settings_store.load().await;

    // Sinks + dispatch queue
    let alert = AlertPublisher::new(nats.client().clone(), config.nats.alert_subject.clone());
    let anomaly_store = AnomalyStore::new(nats.object_store().clone(), &config.persistence);
    let (anomaly_tx, _dispatcher) = spawn_dispatcher(alert, anomaly_store.clone());

    // Per-area detection flows
    let orchestrator = Orchestrator::start(
        nats.client(),
        &config.areas,
        settings_cell.clone(),
        anomaly_tx,
    )
    .await
    .context("Startup failed: could not initialize areas")?;

    // HTTP query + settings surface
    let router = api::create_api_router(
        Arc::new(AnomalyApiState {
            store: anomaly_store,
        }),
        Arc::new(SettingsApiState {
            store: settings_store,
        }),
    );
    let listener = tokio::net::TcpListener::bind(&config.http.listen_addr)
        .await
        .context(format!("Failed to bind {}", config.http.listen_addr))?;
    info!("HTTP API listening on {}", config.http.listen_addr);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            warn!(error = %e, "HTTP server ended");
        }
    });

    info!("Anomaly detector system is running");

    shutdown_signal().await;
    info!("Shutting down...");
    orchestrator.stop().await;
    info!("Anomaly detector system stopped");

    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install SIGINT handler");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
