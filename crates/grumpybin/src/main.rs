//! GrumpyBin
//!
//! Proximity-triggered talking bin.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize tracing and, if configured, the Prometheus exporter
//! 3. Open the line store (file or database) and spawn its actor
//! 4. Connect to the broker and spawn the control-plane channel
//! 5. Build devices and the actuation coordinator, spawn the activation monitor
//! 6. Wait for shutdown signal
//!
//! Any failure before step 6 aborts the process.

#![warn(clippy::pedantic)]
#![allow(clippy::too_many_lines)] // main.rs orchestrates startup, naturally longer

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use grumpybin::activation::{ActivationMonitor, FirePolicy};
use grumpybin::actuation::{ActuationCoordinator, PulseConfig};
use grumpybin::channel::{ControlPlaneChannel, MqttTransport, PubSubTransport, RedisTransport};
use grumpybin::config::{ActuatorKind, BrokerKind, Config, SensorKind, StorageBackendKind};
use grumpybin::devices::{
    ActivationSensor, Actuator, CommandSpeechEngine, FileDistanceSensor, GpioValueActuator, Level,
    LogActuator, StdinTriggerSensor,
};
use grumpybin::errors::BinError;
use grumpybin::observability::metrics::init_metrics_exporter;
use grumpybin::protocol::CommandDispatcher;
use grumpybin::store::{FileLineStore, LineStore, LineStoreHandle, PostgresLineStore};
use secrecy::ExposeSecret;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Upper bound on waiting for an in-flight sequence at shutdown.
const SHUTDOWN_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration first: LOG_LEVEL decides the default filter
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {e}");
        e
    })?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.filter_directive().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting GrumpyBin");
    info!(
        broker = %config.broker,
        broker_host = %config.broker_host,
        broker_port = config.broker_port,
        broker_topic = %config.broker_topic,
        storage_backend = %config.storage_backend,
        activation_policy = ?config.activation_policy,
        poll_interval_ms = config.poll_interval.as_millis(),
        "Configuration loaded successfully"
    );

    if let Some(bind_address) = &config.metrics_bind_address {
        let addr: SocketAddr = bind_address.parse().map_err(|e| {
            error!(error = %e, addr = %bind_address, "Invalid metrics bind address");
            format!("Invalid metrics bind address: {e}")
        })?;
        init_metrics_exporter(addr).map_err(|e| {
            error!(error = %e, "Failed to install Prometheus metrics exporter");
            format!("Failed to install Prometheus metrics exporter: {e}")
        })?;
        info!(addr = %addr, "Prometheus metrics exporter listening");
    }

    let shutdown_token = CancellationToken::new();

    // Line store
    let backend = open_store(&config).await.map_err(|e| {
        error!(error = %e, "Failed to open line store");
        e
    })?;
    let (store, store_task) = LineStoreHandle::spawn(backend, shutdown_token.child_token());

    // Control plane
    let transport = open_transport(&config).await.map_err(|e| {
        error!(error = %e, "Failed to connect to broker");
        e
    })?;

    let channel = ControlPlaneChannel::new(
        transport,
        CommandDispatcher::new(store.clone()),
        config.broker_topic.clone(),
        config.resubscribe_backoff,
    );
    let channel_task = tokio::spawn(channel.run(shutdown_token.child_token()));

    // Devices and actuation
    let actuator = build_actuator(&config);
    let sensor = build_sensor(&config).map_err(|e| {
        error!(error = %e, "Failed to start sensor");
        e
    })?;
    let speech = Arc::new(CommandSpeechEngine::new(
        config.speech_command.clone(),
        config.speech_voice.clone(),
    ));

    let coordinator = ActuationCoordinator::new(
        Arc::clone(&actuator),
        speech,
        store,
        PulseConfig::from_config(&config),
        shutdown_token.clone(),
    );

    let monitor = ActivationMonitor::new(
        sensor,
        FirePolicy::from_config(&config),
        config.activation_threshold_cm,
        config.poll_interval,
        coordinator.clone(),
    );
    let monitor_task = tokio::spawn(monitor.run(shutdown_token.child_token()));

    info!("GrumpyBin running - press Ctrl+C to shutdown");
    shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown...");
    shutdown_token.cancel();

    if tokio::time::timeout(SHUTDOWN_IDLE_TIMEOUT, coordinator.wait_idle())
        .await
        .is_err()
    {
        warn!(
            timeout_secs = SHUTDOWN_IDLE_TIMEOUT.as_secs(),
            "Actuation sequence did not stop in time"
        );
    }

    if let Err(e) = actuator.set(Level::Low).await {
        warn!(error = %e, "Failed to de-assert actuator");
    }

    for (name, task) in [
        ("monitor", monitor_task),
        ("channel", channel_task),
        ("store", store_task),
    ] {
        if let Err(e) = task.await {
            warn!(task = name, error = %e, "Task ended abnormally");
        }
    }

    info!("GrumpyBin shutdown complete");
    Ok(())
}

async fn open_store(config: &Config) -> Result<Box<dyn LineStore>, BinError> {
    match config.storage_backend {
        StorageBackendKind::File => {
            let store = FileLineStore::open(&config.lines_file).await?;
            info!(path = %store.path().display(), "Using file line store");
            Ok(Box::new(store))
        }
        StorageBackendKind::Database => {
            let url = config.database_connection_string.as_ref().ok_or_else(|| {
                BinError::Internal("database backend selected without connection string".into())
            })?;
            info!("Connecting to database...");
            let store = PostgresLineStore::connect(url.expose_secret()).await?;
            info!("Using database line store");
            Ok(Box::new(store))
        }
    }
}

async fn open_transport(config: &Config) -> Result<Arc<dyn PubSubTransport>, BinError> {
    match config.broker {
        BrokerKind::Mqtt => {
            let transport = MqttTransport::new(config.broker_host.clone(), config.broker_port);
            info!(client_id = %transport.client_id(), "Using MQTT broker");
            Ok(Arc::new(transport))
        }
        BrokerKind::Redis => {
            info!("Connecting to Redis broker...");
            let transport = RedisTransport::connect(&config.redis_url()).await?;
            info!("Redis broker connection established");
            Ok(Arc::new(transport))
        }
    }
}

fn build_actuator(config: &Config) -> Arc<dyn Actuator> {
    match &config.actuator {
        ActuatorKind::Log => Arc::new(LogActuator),
        ActuatorKind::Gpio { path } => {
            info!(path = %path, "Using GPIO actuator");
            Arc::new(GpioValueActuator::new(path))
        }
    }
}

fn build_sensor(config: &Config) -> Result<Arc<dyn ActivationSensor>, BinError> {
    match &config.sensor {
        SensorKind::Stdin => {
            info!("Using keyboard trigger - press Enter to activate");
            Ok(Arc::new(StdinTriggerSensor::spawn()?))
        }
        SensorKind::File { path } => {
            info!(path = %path, "Using file distance sensor");
            Ok(Arc::new(FileDistanceSensor::new(path)))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
