use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use provenant_consensus::LedgerNode;
use provenant_core::LedgerError;

use crate::routes;

/// Assemble the full JSON API. CORS is wide open: the browser UI talks to
/// nodes directly.
pub fn router(node: Arc<LedgerNode>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/add-transaction", post(routes::add_transaction))
        .route("/mine", post(routes::mine))
        .route("/chain", get(routes::chain))
        .route("/mempool", get(routes::mempool))
        .route("/status", get(routes::status))
        .route("/health", get(routes::health))
        .route("/nodes", get(routes::nodes))
        .route("/register-node", post(routes::register_node))
        .route("/receive-block", post(routes::receive_block))
        .route("/sync", post(routes::sync))
        .route("/history/{batch_id}", get(routes::history))
        .route("/verify/{batch_id}", get(routes::verify))
        .layer(cors)
        .with_state(node)
}

/// Serve the API until `shutdown` resolves, then drain in-flight requests.
pub async fn serve(
    node: Arc<LedgerNode>,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), LedgerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| LedgerError::Persistence(format!("binding {addr}: {e}")))?;
    info!(%addr, "HTTP API listening");
    axum::serve(listener, router(node))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| LedgerError::Persistence(format!("http server: {e}")))
}
