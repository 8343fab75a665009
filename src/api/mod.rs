//! REST surface of the control plane
//!
//! All routes live under `/api/v1`. Errors are returned as
//! `{"error": {"code", "message", "hint"}}` with the status derived from the
//! error kind.

mod error;
mod handlers;
mod middleware;
mod models;
mod state;

pub use error::{codes, ApiError, ApiErrorBody, ApiErrorMessage};
pub use models::{CleanupQuery, EmptyResponse, ServiceBatchBindRequest, ServiceBindRequest};
pub use state::ApiState;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, patch, post},
    Router,
};
use tokio::net::TcpListener;
use tracing::info;

use crate::error::{CorralError, CorralResult};

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/api/v1/namespaces/{namespace}/applications/{app}",
            get(handlers::show_app),
        )
        .route(
            "/api/v1/namespaces/{namespace}/applications/{app}/servicebindings",
            post(handlers::batch_bind),
        )
        .route(
            "/api/v1/namespaces/{namespace}/applications/{app}/stage",
            post(handlers::stage_app),
        )
        .route(
            "/api/v1/namespaces/{namespace}/services/{service}",
            patch(handlers::update_service),
        )
        .route(
            "/api/v1/namespaces/{namespace}/services/{service}/bind",
            post(handlers::bind_service),
        )
        .route(
            "/api/v1/namespaces/{namespace}/services/{service}/bind/{app}",
            delete(handlers::unbind_service),
        )
        .route(
            "/api/v1/maintenance/cleanup-stale-caches",
            get(handlers::cleanup_stale_caches_query).post(handlers::cleanup_stale_caches),
        )
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}

/// Serve the API until `shutdown` resolves
pub async fn serve<F>(listen: &str, state: ApiState, shutdown: F) -> CorralResult<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(listen)
        .await
        .map_err(|e| CorralError::io(format!("binding {}", listen), e))?;
    info!("Listening on {}", listen);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| CorralError::io("serving API", e))
}
