//! HTTP server wiring for the graph API

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header::CONTENT_TYPE, Method};
use axum::routing::{get, post};
use axum::Router;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::core::error::{Error, Result};
use crate::engine::GraphEngine;

use super::handlers;

/// Build the application router with all routes and middleware.
pub fn router(engine: Arc<GraphEngine>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .allow_origin(Any);

    Router::new()
        .route("/", get(handlers::info))
        .route("/graph/vertex", post(handlers::create_vertex))
        .route(
            "/graph/vertex/:vertex_id",
            get(handlers::get_vertex).post(handlers::create_child_vertex),
        )
        .route("/graph/vertex/:vertex_id/edges", get(handlers::get_edges))
        .route("/graph/edge", post(handlers::create_edge))
        .route("/graph/rpc", get(handlers::rpc_upgrade))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(engine)
}

/// Serve the API until a shutdown signal arrives, then close the backend.
pub async fn serve(addr: SocketAddr, engine: Arc<GraphEngine>) -> Result<()> {
    let app = router(engine.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::network(e.to_string()))?;

    engine.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received terminate signal"),
    }
}
