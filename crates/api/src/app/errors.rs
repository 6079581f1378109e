use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use stockforge_infra::DispatchError;

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::InvalidArgument(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_argument", msg),
        DispatchError::NotFound(what) => json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found")),
        e @ DispatchError::InsufficientStock { .. } => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "insufficient_stock", e.to_string())
        }
        DispatchError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        // Only seen here when retries were exhausted.
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        e @ DispatchError::Duplicate { .. } => json_error(StatusCode::CONFLICT, "conflict", e.to_string()),
        e @ (DispatchError::InvariantViolation(_)
        | DispatchError::TenantIsolation(_)
        | DispatchError::Deserialize(_)
        | DispatchError::Store(_)) => {
            error!(error = %e, "internal failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", "internal error")
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn invalid_id(what: &str) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id"))
}
