//! Bindery server binary.

use anyhow::{Context, Result};
use bindery_core::config::AppConfig;
use bindery_metadata::MetadataStore;
use bindery_server::notify::{LogMailer, Notifier};
use bindery_server::{AppState, create_router, ownership, ratelimit};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Bindery - a book catalog and lending service
#[derive(Parser, Debug)]
#[command(name = "binderyd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "BINDERY_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Bindery v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file is optional, env vars can provide/override
    // everything)
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %args.config, "loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("no config file found at {}", args.config);
    }

    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with("BINDERY_") && key != "BINDERY_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: binderyd --config /path/to/config.toml\n  \
             2. Environment variables: BINDERY_SERVER__BIND=0.0.0.0:8080 \
             BINDERY_METADATA__TYPE=sqlite BINDERY_METADATA__PATH=bindery.db binderyd\n\n\
             Set BINDERY_CONFIG to specify a default config file path."
        );
    }

    if !has_config_file {
        tracing::info!("using environment variables for configuration");
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("BINDERY_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    // Initialize the entity store and verify it before accepting requests.
    let metadata = bindery_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    metadata
        .health_check()
        .await
        .context("metadata store health check failed")?;
    tracing::info!("metadata store initialized");

    // Notifications go to the log until a real mailer is wired in.
    let notifier = Notifier::spawn(Arc::new(LogMailer), &config.notify);
    tracing::info!(
        workers = config.notify.workers,
        queue_capacity = config.notify.queue_capacity,
        "notification workers spawned"
    );

    let state = AppState::new(config.clone(), metadata, notifier);

    if let Some(cleanup_interval) = state.rate_limit_cleanup_interval() {
        ratelimit::spawn_cleanup_task(state.rate_limit.clone(), cleanup_interval);
        tracing::info!(
            interval_secs = cleanup_interval.as_secs(),
            "rate limiter cleanup task spawned"
        );
    }

    let sweep_interval = state.ownership_sweep_interval();
    ownership::spawn_sweep_task(state.ownership.clone(), sweep_interval);
    tracing::info!(
        interval_secs = sweep_interval.as_secs(),
        "ownership cache sweep task spawned"
    );

    let app = create_router(state);

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    tracing::info!("listening on {}", addr);

    // ConnectInfo is required so the rate limiter can key by client IP.
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install shutdown signal handler");
    }
    tracing::info!("shutdown signal received");
}
