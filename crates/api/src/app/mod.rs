//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `routes/`: HTTP routes + handlers, one file per area
//! - `dto.rs`: request DTOs and their mapping to domain inputs
//! - `errors.rs`: consistent error responses
//!
//! Handlers are generic over the store; the services are synchronous, so
//! every call runs on the blocking pool.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tracing::error;

use larder_infra::{CoreStore, ServiceError, Services};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app<S: CoreStore>(services: Services<S>) -> Router {
    let services = Arc::new(services);

    let scoped = routes::router::<S>()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn(middleware::organization_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(scoped)
        .layer(ServiceBuilder::new())
}

/// Run a service call on the blocking pool and map its result to JSON.
pub(crate) async fn blocking<T, F>(status: StatusCode, f: F) -> Response
where
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
    T: Serialize + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => (status, Json(value)).into_response(),
        Ok(Err(err)) => errors::service_error_to_response(err),
        Err(join) => {
            error!(error = %join, "blocking service task failed");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "request task failed")
        }
    }
}
