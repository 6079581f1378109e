use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockforge_orders::OrderId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{OperatorContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/:id", get(get_order))
        .route("/:id/status", post(update_status))
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(operator): Extension<OperatorContext>,
    Json(body): Json<dto::CreateOrderBody>,
) -> axum::response::Response {
    let request = match body.into_request() {
        Ok(r) => r,
        Err(e) => return errors::dispatch_error_to_response(e),
    };
    let (tenant_id, operator_id) = (tenant.tenant_id(), operator.operator_id());

    match services.run(move |s| s.create_order(tenant_id, request, operator_id)).await {
        Ok(order) => (StatusCode::CREATED, Json(dto::order_to_json(&order))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("order"),
    };
    let tenant_id = tenant.tenant_id();

    match services.run(move |s| s.order(tenant_id, order_id)).await {
        Ok(order) => (StatusCode::OK, Json(dto::order_to_json(&order))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let tenant_id = tenant.tenant_id();

    match services.run(move |s| s.orders(tenant_id)).await {
        Ok(orders) => {
            let items: Vec<_> = orders.iter().map(dto::order_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(operator): Extension<OperatorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateStatusBody>,
) -> axum::response::Response {
    let order_id: OrderId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("order"),
    };
    let (tenant_id, operator_id) = (tenant.tenant_id(), operator.operator_id());

    match services
        .run(move |s| s.update_order_status(tenant_id, order_id, body.status, operator_id))
        .await
    {
        Ok(order) => (StatusCode::OK, Json(dto::order_to_json(&order))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
