use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockforge_catalog::{Product, ProductId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product))
        .route("/:id", get(get_product))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::CreateProductBody>,
) -> axum::response::Response {
    let unit_price = match dto::parse_money(&body.unit_price) {
        Ok(p) => p,
        Err(msg) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_argument", msg),
    };
    let product = match Product::new(tenant.tenant_id(), body.sku, unit_price) {
        Ok(p) => p,
        Err(e) => return errors::dispatch_error_to_response(e.into()),
    };

    match services.run(move |s| s.register_product(product)).await {
        Ok(p) => (StatusCode::CREATED, Json(dto::product_to_json(&p))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("product"),
    };

    let tenant_id = tenant.tenant_id();

    match services.run(move |s| s.product(tenant_id, product_id)).await {
        Ok(p) => (StatusCode::OK, Json(dto::product_to_json(&p))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
