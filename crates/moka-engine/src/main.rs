//! Engine binary for the moka pot brew simulator.
//!
//! This is the composition root: it loads configuration, starts the
//! simulator service, connects the MQTT transport and the observer
//! server to it, and runs until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `moka-config.yaml` (or `$MOKA_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Validate configuration; any problem is fatal
//! 4. Derive the brew model
//! 5. Configure the MQTT transport
//! 6. Spawn the simulator service publishing to MQTT and the observer feed
//! 7. Start the Observer API server
//! 8. Drive the MQTT event loop on its own task
//! 9. Wait for `Ctrl-C`, then shut everything down

mod control;
mod error;
mod mqtt;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use moka_core::config::MokaConfig;
use moka_core::model::BrewModel;
use moka_core::publish::{FanoutPublisher, StatePublisher};
use moka_core::service::spawn_simulator;
use moka_observer::state::{AppState, StateFeed};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::mqtt::MqttTransport;

/// Config file used when `MOKA_CONFIG` is not set.
const DEFAULT_CONFIG_PATH: &str = "moka-config.yaml";

/// How long the transport gets to flush its DISCONNECT on shutdown.
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if configuration is invalid or a subsystem fails to
/// start.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration.
    let config_path = config_path();
    let config = MokaConfig::load(&config_path)?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(path = %config_path.display(), "moka-engine starting");

    // 3. Validate.
    if let Err(e) = config.validate() {
        error!(error = %e, "Configuration rejected");
        return Err(e.into());
    }
    info!(
        tick_ms = config.simulation.tick_ms,
        ramp_ms = config.simulation.ramp_ms,
        topic_prefix = %config.transport.topic_prefix,
        observer_port = config.observer.port,
        "Configuration loaded"
    );

    // 4. Derive the brew model.
    let model = BrewModel::from_config(&config.simulation);
    info!(
        temperature_delta = model.temperature_delta,
        coffee_delta = model.coffee_delta,
        "Brew model ready"
    );

    // 5. Configure the MQTT transport.
    let connected = Arc::new(AtomicBool::new(false));
    let transport = MqttTransport::new(&config.transport, Arc::clone(&connected))?;
    let mqtt_publisher = transport.publisher();

    // 6. Spawn the simulator service.
    let feed = Arc::new(StateFeed::new());
    let publisher = FanoutPublisher::new()
        .with(Arc::clone(&mqtt_publisher) as Arc<dyn StatePublisher>)
        .with(Arc::clone(&feed) as Arc<dyn StatePublisher>);
    let (simulator, simulator_task) = spawn_simulator(model, Arc::new(publisher));
    info!("Simulator service started");

    // 7. Start Observer API server.
    let app_state = Arc::new(AppState::with_connectivity(
        feed,
        simulator.clone(),
        Arc::clone(&connected),
    ));
    let observer_handle = moka_observer::spawn_observer(&config.observer, app_state).await?;

    // 8. Drive the MQTT event loop.
    let mut transport_handle = tokio::spawn(transport.run(simulator.clone()));
    info!("MQTT transport running");

    // 9. Wait for shutdown.
    tokio::signal::ctrl_c()
        .await
        .map_err(|source| EngineError::Signal { source })?;
    info!("Shutdown signal received");

    if let Err(e) = simulator.shutdown().await {
        warn!(error = %e, "Simulator already stopped");
    }
    if let Err(e) = simulator_task.await {
        warn!(error = %e, "Simulator task ended abnormally");
    }

    mqtt_publisher.disconnect();
    if tokio::time::timeout(DISCONNECT_GRACE, &mut transport_handle)
        .await
        .is_err()
    {
        warn!("MQTT transport did not disconnect in time");
        transport_handle.abort();
    }

    observer_handle.abort();
    info!("moka-engine shutdown complete");

    Ok(())
}

/// Resolve the configuration file path.
fn config_path() -> PathBuf {
    std::env::var_os("MOKA_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}
