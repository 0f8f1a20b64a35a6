use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tunecast_core::{
    load_config, validate_config, Config, Engine, FfmpegTranscoder, MediaDiscovery, MediaLibrary,
    SqliteLibrary, Transcoder,
};
use tunecast_server::{api::create_router, state::AppState};

/// Environment variable naming the config file.
const CONFIG_ENV: &str = "TUNECAST_CONFIG";

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn read_config() -> Result<Config> {
    let path = std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", path);
    let config =
        load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))?;
    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

async fn run() -> Result<()> {
    let config = read_config()?;
    info!(
        "Library database {:?}, cache directory {:?}",
        config.library.database, config.transcode.cache_dir
    );

    let library: Arc<dyn MediaLibrary> = Arc::new(
        SqliteLibrary::new(&config.library.database).context("Failed to open media library")?,
    );

    let transcoder: Arc<dyn Transcoder> =
        Arc::new(FfmpegTranscoder::new(config.transcode.clone()));
    // Native and cached files still serve without ffmpeg
    if let Err(e) = transcoder.validate().await {
        warn!("Transcoding disabled: {}", e);
    }

    let engine = Arc::new(
        Engine::start(Arc::clone(&transcoder), config.transcode.clone())
            .context("Failed to start transcode engine")?,
    );

    let discovery = Arc::new(
        MediaDiscovery::new(Arc::clone(&library), transcoder)
            .with_max_depth(config.library.max_depth),
    );
    if config.library.scan_on_startup {
        let discovery = Arc::clone(&discovery);
        let roots = config.library.media_dirs.clone();
        tokio::spawn(async move { discovery.scan(&roots).await });
    }

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let state = Arc::new(AppState::new(
        config,
        library,
        Arc::clone(&engine),
        discovery,
    ));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // No encoder may outlive the server
    engine.shutdown().await;
    info!("Shut down cleanly");

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
