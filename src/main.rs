use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};

use review_server::api;
use review_server::config::Config;
use review_server::id::IdGenerator;
use review_server::repository::SqliteRepository;
use review_server::{AppState, ReviewService};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Starting review service");

    let config = Config::from_env().context("Failed to load configuration from environment")?;

    let db_path = config.state_dir.join("reviews.db");
    info!("Using review database: {}", db_path.display());
    let repository =
        SqliteRepository::new(&db_path).context("Failed to initialize SQLite database")?;

    let service = ReviewService::new(Arc::new(repository), IdGenerator::new(config.node_id));
    let state = Arc::new(AppState { service });

    let app = api::app(state).layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("Server listening on port {}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
