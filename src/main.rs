use std::future::IntoFuture;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use webchat::adapters::engine::{EchoEngineFactory, InMemoryToolRegistry};
use webchat::adapters::events::{InMemoryEventBus, RedisStreamBus, RedisStreamConfig};
use webchat::adapters::http::{app_router, AppState};
use webchat::application::StreamingHub;
use webchat::config::{AppConfig, BusBackend, BusConfig, ConfigError, ServerConfig, ValidationError};
use webchat::ports::{BusError, EventBus};

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] ValidationError),

    #[error("event bus unavailable: {0}")]
    Bus(#[from] BusError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    let settings = config.streaming_settings()?;
    let bus = connect_bus(&config.bus).await?;
    let engines = Arc::new(EchoEngineFactory::new(config.engine.echo_config()));
    let tools = Arc::new(InMemoryToolRegistry::with_builtin_tools());
    let hub = Arc::new(StreamingHub::new(bus, engines, tools, settings));
    let profiles = config.engine.profile_catalog()?;
    tracing::debug!(count = profiles.len(), "chat profiles loaded");

    let app = app_router(
        AppState::new(hub.clone(), config.streaming.viewer_queue_capacity).with_profiles(profiles),
        &config.server.cors_origins_list(),
    );

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        environment = ?config.server.environment,
        bus = ?config.bus.backend,
        protocol = ?config.streaming.protocol,
        "webchat listening"
    );

    let stopping = CancellationToken::new();
    let sweeper = hub.spawn_eviction_loop(stopping.clone());
    let serve = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(hub, stopping.clone()))
        .into_future();

    // Open sockets keep graceful shutdown waiting; bound it.
    let timeout = config.server.shutdown_timeout();
    tokio::select! {
        result = serve => result?,
        _ = async {
            stopping.cancelled().await;
            tokio::time::sleep(timeout).await;
        } => {
            tracing::warn!(?timeout, "shutdown timeout elapsed, dropping remaining connections");
        }
    }

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    tracing::info!("webchat stopped");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&server.log_level));

    if server.json_logs() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn connect_bus(config: &BusConfig) -> Result<Arc<dyn EventBus>, StartupError> {
    match config.backend {
        BusBackend::Memory => {
            tracing::info!("using in-memory event bus");
            Ok(Arc::new(InMemoryEventBus::with_capacity(config.channel_capacity)))
        }
        BusBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or(ValidationError::MissingRequired("bus.redis_url"))?;
            let stream_config = RedisStreamConfig {
                group: config.consumer_group.clone(),
                block_ms: config.block_ms,
                channel_capacity: config.channel_capacity,
                ..Default::default()
            };
            Ok(Arc::new(RedisStreamBus::connect(url, stream_config).await?))
        }
    }
}

async fn shutdown_signal(hub: Arc<StreamingHub>, stopping: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
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

    tracing::info!("shutdown signal received");
    hub.shutdown().await;
    stopping.cancel();
}
