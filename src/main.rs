use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use fleetops::engine::Engine;
use fleetops::limits::{MAX_SWEEP_INTERVAL_SECS, SWEEP_INTERVAL_SECS};
use fleetops::notify::NotifyHub;
use fleetops::settings::{SettingsHandle, VacationSettings};
use fleetops::store::MemoryStore;
use fleetops::sweep;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("FLEETOPS_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    fleetops::observability::init(metrics_port);

    let sweep_interval: u64 = std::env::var("FLEETOPS_SWEEP_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(SWEEP_INTERVAL_SECS)
        .min(MAX_SWEEP_INTERVAL_SECS);

    // Quota settings come from a JSON file when configured; the engine falls
    // back to defaults and can be updated at runtime through the handle.
    let settings = match std::env::var("FLEETOPS_SETTINGS").ok() {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)?;
            let parsed: VacationSettings = serde_json::from_str(&raw)?;
            info!("loaded quota settings from {path}");
            parsed
        }
        None => VacationSettings::default(),
    };

    let store = Arc::new(MemoryStore::new());
    let notify = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::new(store, SettingsHandle::new(settings), notify));

    info!("fleetops starting");
    info!("  sweep_interval: {sweep_interval}s");
    info!(
        "  metrics: {}",
        metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    // Sweep once at startup, then on the fixed interval.
    let sweep_engine = engine.clone();
    let sweeper = tokio::spawn(async move {
        sweep::run_scheduler(sweep_engine, Duration::from_secs(sweep_interval)).await;
    });

    // Graceful shutdown on SIGTERM/ctrl-c.
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    shutdown.await;

    info!("shutdown signal received");
    sweeper.abort();
    info!("fleetops stopped");
    Ok(())
}
