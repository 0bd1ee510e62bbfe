use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use pvz_auth::Permission;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::RoleContext;

pub async fn open(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RoleContext>,
    Json(body): Json<dto::OpenReceptionRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&ctx, &Permission::RECEPTIONS_OPEN) {
        return resp;
    }
    let pvz = match dto::parse_pickup_point_id(&body.pvz_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.open_reception(pvz).await {
        Ok(r) => (StatusCode::CREATED, Json(dto::reception_to_json(&r))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn close_last(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RoleContext>,
    Path(pvz_id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&ctx, &Permission::RECEPTIONS_CLOSE) {
        return resp;
    }
    let pvz = match dto::parse_pickup_point_id(&pvz_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.close_last_reception(pvz).await {
        Ok(r) => Json(dto::reception_to_json(&r)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
