use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use pvz_core::DomainError;
use pvz_infra::{LedgerError, RegistryError};
use pvz_receptions::LedgerViolation;

use super::services::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Ledger(LedgerError::Rule(v)) => violation_to_response(&v),
        ServiceError::Ledger(LedgerError::Contention { pickup_point_id, .. }) => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "store_contention",
            format!("pickup point {pickup_point_id} is busy; retry the request"),
        ),
        // Store details are logged by the service layer, not echoed to clients.
        ServiceError::Ledger(LedgerError::Store { operation, .. })
        | ServiceError::Registry(RegistryError::Store { operation, .. }) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            format!("{operation} failed"),
        ),
        e @ ServiceError::Timeout { .. } => {
            json_error(StatusCode::GATEWAY_TIMEOUT, "timeout", e.to_string())
        }
    }
}

fn violation_to_response(v: &LedgerViolation) -> axum::response::Response {
    let status = match v {
        LedgerViolation::PickupPointNotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_REQUEST,
    };
    json_error(status, v.code(), v.to_string())
}

/// Map an input parsing failure to a 400 carrying `code`.
pub fn domain_error_to_response(code: &'static str, err: DomainError) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, code, err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
