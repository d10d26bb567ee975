//! Speech synthesis service (voxmill-synth) - Main entry point
//!
//! Serves text-to-speech, voice conversion and batch TTS jobs over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voxmill_common::config::{default_config_path, resolve_root_folder, ROOT_FOLDER_ENV};
use voxmill_synth::config::Settings;
use voxmill_synth::{build_router, AppState};

/// Command-line arguments for voxmill-synth
#[derive(Parser, Debug)]
#[command(name = "voxmill-synth")]
#[command(about = "Speech synthesis and voice conversion service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "VOXMILL_PORT")]
    port: Option<u16>,

    /// TOML configuration file
    #[arg(short, long, env = "VOXMILL_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder for outputs, speaker profiles and models
    #[arg(short, long)]
    root_folder: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_file = args.config.clone().or_else(|| default_config_path("voxmill-synth"));
    let root_folder = resolve_root_folder(
        args.root_folder.as_deref(),
        ROOT_FOLDER_ENV,
        config_file.as_deref(),
    )
    .context("Failed to resolve root folder")?;

    let mut settings =
        Settings::load(&root_folder, config_file.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        settings.port = port;
    }

    // RUST_LOG wins over the config file's [logging] level
    let level = &settings.logging.level;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "voxmill_synth={level},voxmill_common={level},tower_http={level}",
                    level = level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    settings
        .ensure_directories()
        .context("Failed to create output directories")?;

    info!("Starting voxmill-synth on port {}", settings.port);
    info!("Root folder: {}", root_folder.display());
    info!(
        tts_engine = %settings.tts_engine,
        vc_engine = %settings.vc_engine,
        sample_rate = settings.sample_rate,
        target_lufs = settings.target_lufs,
        output_dir = %settings.output_dir.display(),
        "Configuration"
    );

    let port = settings.port;
    let app = build_router(AppState::new(settings));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install signal handler: {}", e);
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
