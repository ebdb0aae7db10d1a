//! facts-gen - Track Facts Generator microservice
//!
//! **Module Identity:**
//! - Name: facts-gen
//! - Health port: 8086 (`server.bind-address`)
//!
//! Consumes track lifecycle events from Kafka, asks the LLM gateway for a
//! short fact about the track and publishes the result for the storage
//! service.

use std::sync::Arc;

use anyhow::{Context, Result};
use facts_common::config::Settings;
use facts_gen::bus::kafka::{KafkaConsumerLoop, KafkaProducer};
use facts_gen::{build_router, AppState, FactsService};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; `logging.level` replaces the filter once config is
    // loaded unless RUST_LOG is set
    let rust_log = std::env::var_os("RUST_LOG").is_some();
    let (filter, filter_handle) = reload::Layer::new(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load().context("Failed to load configuration")?;

    if !rust_log {
        let level = EnvFilter::try_new(&settings.logging.level)
            .with_context(|| format!("Invalid logging.level '{}'", settings.logging.level))?;
        filter_handle
            .reload(level)
            .context("Failed to apply logging.level")?;
    }

    info!("Starting facts-gen (Track Facts Generator) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        bootstrap_servers = %settings.app.kafka.bootstrap_servers,
        inbound_topic = %settings.app.kafka.topics.facts_events,
        dead_letter_topic = %settings.app.kafka.topics.dead_letter(),
        outbound_topic = %settings.app.kafka.topics.generated_facts,
        "Kafka topics"
    );

    if settings.app.llm.proxyapi.api_key.trim().is_empty() {
        warn!("app.llm.proxyapi.api-key is not set; every generation will fail until it is configured");
    }

    let producer = Arc::new(
        KafkaProducer::new(&settings.app.kafka).context("Failed to initialize Kafka producer")?,
    );

    let service = FactsService::from_settings(&settings, producer)
        .context("Failed to initialize facts service")?;
    service.start();

    let consumer = KafkaConsumerLoop::new(&settings.app.kafka, service.record_handler())
        .context("Failed to initialize Kafka consumer")?;

    let shutdown = CancellationToken::new();

    // Health endpoint
    let app = build_router(AppState::new(service.status()));
    let listener = tokio::net::TcpListener::bind(&settings.server.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", settings.server.bind_address))?;
    info!("Health check: http://{}/health", settings.server.bind_address);

    let server_shutdown = shutdown.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await
    });

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_shutdown.cancel();
    });

    consumer.run(shutdown.clone()).await;

    service.shutdown().await;
    server
        .await
        .context("Health server task failed")?
        .context("Health server error")?;

    info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
