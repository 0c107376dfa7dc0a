use std::{net::SocketAddr, sync::Arc};

use clap::Parser;
use tokio::{net::TcpListener, signal};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use traffic_monitor::{
    Engine, TickScheduler,
    config::Config,
    server::{self, AppState},
};

// ===== Main Application =====
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .init();

    let config = Config::parse();

    info!("Starting Traffic Monitor");
    info!("Tick interval: {}ms", config.tick_ms);

    let engine = Arc::new(Engine::with_defaults(config.seed));
    attach_kafka(&engine, &config).await;

    let mut scheduler = TickScheduler::new(config.tick_period());
    scheduler.start(engine.clone());

    let app = server::router(AppState::new(engine.clone(), config.subscriber_buffer))
        .layer(server::cors_layer(config.cors_origin.as_deref())?);

    let address = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(address).await?;
    info!("Server running on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop();
    info!("Server shut down");

    Ok(())
}

#[cfg(feature = "kafka")]
async fn attach_kafka(engine: &Engine, config: &Config) {
    use traffic_monitor::kafka::KafkaObserver;

    let Some(brokers) = config.kafka_brokers.as_deref() else {
        return;
    };
    if let Some(sink) = KafkaObserver::connect_or_degrade(brokers, &config.kafka_topic) {
        engine.subscribe(sink).await;
    }
}

#[cfg(not(feature = "kafka"))]
async fn attach_kafka(_engine: &Engine, config: &Config) {
    if config.kafka_brokers.is_some() {
        tracing::warn!("Built without the `kafka` feature, ignoring --kafka-brokers");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
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
}
