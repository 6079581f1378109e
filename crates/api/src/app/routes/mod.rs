use axum::{Router, routing::get};

pub mod alerts;
pub mod inventory;
pub mod orders;
pub mod products;
pub mod stock_movements;
pub mod system;

/// Router for all tenant-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/inventory", inventory::router())
        .nest("/stock-movements", stock_movements::router())
        .nest("/orders", orders::router())
        .nest("/products", products::router())
        .nest("/alerts", alerts::router())
}
