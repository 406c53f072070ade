//! pedal-id - guitar pedal identification service
//!
//! Serves a capture/upload page, sends the image to a hosted vision model and
//! renders the appraisal with a per-manufacturer value chart. The `identify`
//! subcommand runs one identification from the terminal.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pedal_common::config::{ConfigOverrides, ServiceConfig};
use pedal_common::DataUri;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

use pedal_id::api::identify::IdentifyResponse;
use pedal_id::vision::{PedalIdentifier, VisionClient};
use pedal_id::{build_router, AppState};

/// Command-line arguments for pedal-id
#[derive(Parser, Debug)]
#[command(name = "pedal-id")]
#[command(about = "Identify and appraise guitar effects pedals from a photo")]
#[command(version)]
struct Args {
    /// Config file (defaults to <config dir>/pedal-id/config.toml)
    #[arg(short, long, global = true, env = "PEDAL_ID_CONFIG")]
    config: Option<PathBuf>,

    /// Vision API base URL (OpenAI-compatible)
    #[arg(long, global = true)]
    api_base_url: Option<String>,

    /// Vision model name
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web service (default)
    Serve {
        /// Address to bind
        #[arg(short, long)]
        bind: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Identify pedals in an image file and print the appraisal
    Identify {
        /// Image file (PNG, JPEG, GIF or WebP)
        image: PathBuf,

        /// Print the result, aggregate and view as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Filter starts from RUST_LOG (or info) and is replaced once the
    // configured level is known, unless RUST_LOG was set.
    let rust_log = EnvFilter::try_from_default_env().ok();
    let explicit_filter = rust_log.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(rust_log.unwrap_or_else(|| EnvFilter::new("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting pedal-id v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let (bind_address, port) = match &args.command {
        Some(Command::Serve { bind, port }) => (bind.clone(), *port),
        _ => (None, None),
    };
    let overrides = ConfigOverrides {
        bind_address,
        port,
        api_base_url: args.api_base_url.clone(),
        model: args.model.clone(),
        config_path: args.config.clone(),
    };
    let config = ServiceConfig::resolve(&overrides).context("Failed to resolve configuration")?;

    if !explicit_filter {
        let level = EnvFilter::try_new(&config.log_level)
            .with_context(|| format!("Invalid log level '{}'", config.log_level))?;
        filter_handle
            .reload(level)
            .context("Failed to apply log level")?;
    }

    match args.command {
        Some(Command::Identify { image, json }) => identify_file(config, &image, json).await,
        Some(Command::Serve { .. }) | None => serve(config).await,
    }
}

async fn serve(config: ServiceConfig) -> Result<()> {
    info!(
        "Vision model: {} at {}",
        config.vision.model, config.vision.api_base_url
    );

    let client = VisionClient::new(config.vision.clone()).context("Failed to build vision client")?;
    let listen_address = config.listen_address();

    let state = AppState::new(config, Arc::new(client));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_address)
        .await
        .with_context(|| format!("Failed to bind to {}", listen_address))?;
    info!("pedal-id listening on http://{}", listen_address);
    info!("Health check: http://{}/health", listen_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn identify_file(config: ServiceConfig, path: &std::path::Path, json: bool) -> Result<()> {
    let image = DataUri::from_file(path)
        .with_context(|| format!("Failed to load image {}", path.display()))?;
    image.ensure_within(config.max_image_bytes)?;

    let client = VisionClient::new(config.vision).context("Failed to build vision client")?;
    let result = client
        .identify(&image)
        .await
        .context("Could not identify pedals")?;

    let response = IdentifyResponse::new(result);
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print!("{}", response.view.render_text());
    }
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

    info!("Shutdown signal received");
}
