//! C7: the HTTP surface. Exposes `/v1/messages` (aliased `/v1/message`),
//! wiring the pure transforms in `transform` to a real upstream HTTP client.
//!
//! This crate is the only place in the workspace that performs I/O or
//! suspends; `AppState` is the one piece of state shared across requests
//! besides the model-map cache it wraps.

mod auth;
pub mod error;
mod handler;
pub mod logger;
mod upstream;

use std::net::SocketAddr;

use axum::{Router, routing::post};
use config::{AppConfig, ModelMapCache};

/// Shared, cheaply-cloned state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: std::sync::Arc<AppConfig>,
    pub model_map: ModelMapCache,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let model_map = ModelMapCache::new(config.model_map_path.clone());
        Self { config: std::sync::Arc::new(config), model_map }
    }
}

/// Build the axum [`Router`] exposing the relay's single endpoint under its
/// two accepted paths.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/messages", post(handler::create_message))
        .route("/v1/message", post(handler::create_message))
        .with_state(state)
}

/// Bind and serve the relay until the process receives a shutdown signal
/// (Ctrl-C or SIGTERM).
pub async fn serve(listen_address: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(listen_address).await?;
    log::info!("relay listening on {listen_address}");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}
