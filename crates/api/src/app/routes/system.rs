use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::context::{OperatorContext, TenantContext};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    Extension(tenant): Extension<TenantContext>,
    Extension(operator): Extension<OperatorContext>,
) -> impl IntoResponse {
    Json(serde_json::json!({
        "tenant_id": tenant.tenant_id().to_string(),
        "operator_id": operator.operator_id().to_string(),
    }))
}
