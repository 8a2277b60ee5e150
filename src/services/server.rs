//! HTTP server lifecycle.
//!
//! Binds the webhook and administrative routes and serves them until the
//! cancellation token fires.

use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::services::api::{routes, AppState};

/// Serve on `addr` until `shutdown` is cancelled.
pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let app = routes(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::configuration(format!("Failed to bind to {}: {}", addr, e)))?;

    log::info!("[server] Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    log::info!("[server] Server stopped");
    Ok(())
}
