use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use stockforge_catalog::ProductId;
use stockforge_inventory::MovementKind;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{OperatorContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_movements).post(record_movement))
        .route("/:id", get(get_movement))
}

/// Inbound or outbound movement; the sign comes from `kind`.
pub async fn record_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(operator): Extension<OperatorContext>,
    Json(body): Json<dto::StockMovementBody>,
) -> axum::response::Response {
    let product_id: ProductId = match body.product.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("product"),
    };
    let kind: MovementKind = match body.kind.parse() {
        Ok(k) => k,
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_argument",
                "kind must be one of: inbound, outbound",
            );
        }
    };
    let (tenant_id, operator_id) = (tenant.tenant_id(), operator.operator_id());

    match services
        .run(move |s| {
            s.move_stock(tenant_id, product_id, kind, body.quantity, operator_id, body.batch, body.note)
        })
        .await
    {
        Ok(record) => (StatusCode::CREATED, Json(dto::inventory_to_json(&record))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<dto::MovementsQuery>,
) -> axum::response::Response {
    let product_id: Option<ProductId> = match query.product_id.as_deref().map(str::parse).transpose() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("product"),
    };
    let tenant_id = tenant.tenant_id();

    match services.run(move |s| s.movements(tenant_id, product_id)).await {
        Ok(movements) => {
            let items: Vec<_> = movements.iter().map(dto::movement_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let movement_id: uuid::Uuid = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("stock movement"),
    };
    let tenant_id = tenant.tenant_id();

    match services.run(move |s| s.movement(tenant_id, movement_id)).await {
        Ok(movement) => (StatusCode::OK, Json(dto::movement_to_json(&movement))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
