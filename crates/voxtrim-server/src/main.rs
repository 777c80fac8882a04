//! Voxtrim Server - HTTP API for streaming TTS post-processing

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod engine;
mod error;
mod settings;
mod state;

use settings::Settings;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "voxtrim_server=debug,voxtrim_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Voxtrim Server");

    let settings = Settings::load()?;
    info!(
        "Sample rate: {} Hz, default format: {}",
        settings.audio.sample_rate, settings.server.default_format
    );

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let state = AppState::new(settings);

    // Build router
    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
