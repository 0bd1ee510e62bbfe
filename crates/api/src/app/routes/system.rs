use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;

use pvz_auth::{Hs256Jwt, TokenIssuer};

use crate::app::{dto, errors};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Development login: mint a token for the requested role, no credentials.
pub async fn dummy_login(
    Extension(issuer): Extension<Arc<Hs256Jwt>>,
    Json(body): Json<dto::DummyLoginRequest>,
) -> axum::response::Response {
    let role = match dto::parse_role(&body.role) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match issuer.issue(role, Utc::now()) {
        Ok(token) => {
            tracing::info!(%role, "issued dummy token");
            Json(token).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to sign token");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "token_error", "could not issue token")
        }
    }
}
