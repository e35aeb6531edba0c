use anyhow::Result;
use axum::{extract::DefaultBodyLimit, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

mod config;
mod error;
mod logging;
mod routes;
mod services;

use services::dataset_store::DatasetStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    logging::init_logging()?;

    // Load configuration
    let config = config::load_config()?;
    let addr = config.bind_addr;

    // Build our application state
    let state = Arc::new(AppState::new(config));

    // Run it
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}

pub(crate) fn app(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_file_size;
    Router::new()
        .merge(routes::routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Application state
#[derive(Clone)]
pub struct AppState {
    pub(crate) config: config::Config,
    pub(crate) store: DatasetStore,
}

impl AppState {
    pub(crate) fn new(config: config::Config) -> Self {
        let store = DatasetStore::new(config.dataset_capacity, config.dataset_ttl);
        Self { config, store }
    }
}
