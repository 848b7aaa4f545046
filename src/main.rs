//! translit-serve: seq2seq transliteration HTTP server.
//!
//! Loads the checkpoint once at startup, then serves:
//!   GET / (liveness), POST /transliterate, GET /model_info

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use translit_serve::config::{Cli, Config};
use translit_serve::inference::engine::Transliterator;
use translit_serve::inference::model_loader::Checkpoint;
use translit_serve::server::api::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "translit_serve=debug,tower_http=debug"
    } else {
        "translit_serve=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("translit-serve v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let config = Config::load(&cli.config)?.with_overrides(&cli);

    info!(
        checkpoint = %config.model.checkpoint_path.display(),
        host = config.server.host,
        port = config.server.port,
        cors = config.server.cors,
        "Configuration loaded"
    );

    // Load the model.
    let checkpoint = Checkpoint::load(&config.model.checkpoint_path).with_context(|| {
        format!(
            "failed to load checkpoint {}",
            config.model.checkpoint_path.display()
        )
    })?;
    let engine = Transliterator::from_checkpoint(&checkpoint)
        .context("checkpoint does not match its configuration")?;
    drop(checkpoint);

    let state = Arc::new(AppState::new(engine));

    info!(
        cell = %state.engine.config().cell_kind(),
        layers = state.engine.num_layers(),
        params = state.info.torch_params.count,
        params_formula = state.info.params_formula.count,
        macs = state.info.macs.theoretical,
        "Model loaded successfully"
    );

    // Build the HTTP router.
    let app = build_router(state, config.server.cors);

    // Start the server.
    let listen_addr = config.listen_addr();
    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
