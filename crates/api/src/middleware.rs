use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use stockforge_core::{TenantId, UserId};

use crate::app::errors::json_error;
use crate::context::{OperatorContext, TenantContext};

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const OPERATOR_HEADER: &str = "x-operator-id";

/// Trusts the upstream gateway's identity headers and turns them into request
/// extensions. Missing or malformed headers are rejected with 401.
pub async fn identity_middleware(mut req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let tenant_id: TenantId = match header_id(req.headers(), TENANT_HEADER) {
        Some(id) => id,
        None => return json_error(StatusCode::UNAUTHORIZED, "unauthorized", "missing or invalid X-Tenant-Id"),
    };
    let operator_id: UserId = match header_id(req.headers(), OPERATOR_HEADER) {
        Some(id) => id,
        None => return json_error(StatusCode::UNAUTHORIZED, "unauthorized", "missing or invalid X-Operator-Id"),
    };

    req.extensions_mut().insert(TenantContext::new(tenant_id));
    req.extensions_mut().insert(OperatorContext::new(operator_id));

    next.run(req).await
}

fn header_id<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}
