mod configuration;
mod error;
mod routes;
mod state;

use configuration::Settings;
use state::AppState;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for logging, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::new()?;

    let missing = settings.backend.missing();
    if !missing.is_empty() {
        warn!(
            "Backend is not fully configured, asks will fail until {} {} set",
            missing.join(" and "),
            if missing.len() == 1 { "is" } else { "are" }
        );
    }

    let addr = settings.server.socket_addr()?;
    let state = AppState::new(settings.backend.into_config())?;

    // Create router with CORS support
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::configure(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
