//! HTTP API Server (C9): the REST façade over `/api/v1`, `/health`, and
//! `/metrics`. Grounded on the teacher's `src/server/init.rs` router
//! assembly (axum + `tower_http::cors::CorsLayer` + `tracing` request
//! span layer) and its signal-driven graceful shutdown, trimmed of
//! everything CORS/auth/rate-limiting beyond what §4.9 actually asks
//! for — those are explicitly out of core scope per §1.

pub mod error;
pub mod handlers;
pub mod state;

use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/prompts/generate", post(handlers::generate))
        .route("/api/v1/prompts/search", post(handlers::search))
        .route("/api/v1/prompts/:id", get(handlers::get_prompt))
        .route("/api/v1/prompts/select", post(handlers::select))
        .route("/api/v1/providers", get(handlers::providers))
        .route("/health", get(handlers::health))
        .route("/health/detailed", get(handlers::health_detailed))
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves `router(state)` on `state.config.http.{host,port}` until a
/// termination signal arrives, then stops accepting new connections and
/// waits up to `shutdown_timeout_secs` for in-flight requests to finish.
pub async fn serve(state: AppState) -> std::io::Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);
    let shutdown_timeout = Duration::from_secs(state.config.http.shutdown_timeout_secs);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "http api server listening");

    let app = router(state);
    let serving = axum::serve(listener, app.into_make_service()).with_graceful_shutdown(shutdown_signal());

    // `serving` stops accepting new connections as soon as the signal
    // fires and then drains in-flight ones on its own; the timeout below
    // is the hard ceiling §4.9 asks for on top of that.
    match tokio::time::timeout(shutdown_timeout, serving).await {
        Ok(result) => result,
        Err(_) => {
            info!(timeout_secs = shutdown_timeout.as_secs(), "shutdown grace period elapsed, forcing exit");
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, draining in-flight requests");
}
