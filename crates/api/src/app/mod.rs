//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: event store selection, ledger/fulfillment wiring, alert inbox
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request bodies and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use stockforge_infra::InfraConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &InfraConfig) -> anyhow::Result<Router> {
    let services = Arc::new(services::build_services(config).await?);
    Ok(router_with(services))
}

pub fn router_with(services: Arc<services::AppServices>) -> Router {
    // Tenant-scoped routes: require identity headers.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn(middleware::identity_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
