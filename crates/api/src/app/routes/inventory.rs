use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockforge_catalog::ProductId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{OperatorContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_inventory))
        .route("/:product", get(get_inventory))
        .route("/:product/stocktake", post(stocktake))
        .route("/:product/warning-line", post(set_warning_line))
}

pub async fn list_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let tenant_id = tenant.tenant_id();
    match services.run(move |s| s.inventory_list(tenant_id)).await {
        Ok(records) => {
            let items: Vec<_> = records.iter().map(dto::inventory_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(product): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match product.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("product"),
    };
    let tenant_id = tenant.tenant_id();

    match services.run(move |s| s.inventory(tenant_id, product_id)).await {
        Ok(record) => (StatusCode::OK, Json(dto::inventory_to_json(&record))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn stocktake(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(operator): Extension<OperatorContext>,
    Path(product): Path<String>,
    Json(body): Json<dto::StocktakeBody>,
) -> axum::response::Response {
    let product_id: ProductId = match product.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("product"),
    };
    let (tenant_id, operator_id) = (tenant.tenant_id(), operator.operator_id());

    match services
        .run(move |s| s.stocktake(tenant_id, product_id, body.quantity, operator_id, body.note))
        .await
    {
        Ok(record) => (StatusCode::OK, Json(dto::inventory_to_json(&record))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn set_warning_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(operator): Extension<OperatorContext>,
    Path(product): Path<String>,
    Json(body): Json<dto::WarningLineBody>,
) -> axum::response::Response {
    let product_id: ProductId = match product.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("product"),
    };
    let (tenant_id, operator_id) = (tenant.tenant_id(), operator.operator_id());

    match services
        .run(move |s| s.set_warning_line(tenant_id, product_id, body.threshold, operator_id))
        .await
    {
        Ok(record) => (StatusCode::OK, Json(dto::inventory_to_json(&record))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
