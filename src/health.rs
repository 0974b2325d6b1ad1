//! Liveness endpoint for hosting platforms that probe an HTTP port.

use std::net::{Ipv4Addr, SocketAddr};

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::info;

use crate::registry::{Registry, SharedRegistry};

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub ok: bool,
    pub users: usize,
}

/// Builds the liveness router.
pub fn router(registry: SharedRegistry) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .with_state(registry)
}

/// Serves the liveness endpoint on `0.0.0.0:port` until the process exits.
///
/// # Errors
///
/// Returns an error if the port cannot be bound or the server fails.
pub async fn serve(port: u16, registry: SharedRegistry) -> std::io::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let listener = TcpListener::bind(addr).await?;
    info!("Liveness endpoint listening on {}", addr);
    axum::serve(listener, router(registry)).await
}

async fn root() -> &'static str {
    "Username monitor bot is running 🚀"
}

async fn health(State(registry): State<SharedRegistry>) -> Json<Health> {
    let users = registry.read(Registry::len).await;
    Json(Health { ok: true, users })
}
