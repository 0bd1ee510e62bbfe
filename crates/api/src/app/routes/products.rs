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

pub async fn add(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RoleContext>,
    Json(body): Json<dto::AddProductRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&ctx, &Permission::PRODUCTS_ADD) {
        return resp;
    }
    let product_type = match dto::parse_product_type(&body.product_type) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let pvz = match dto::parse_pickup_point_id(&body.pvz_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.add_product(pvz, product_type).await {
        Ok(p) => (StatusCode::CREATED, Json(dto::product_to_json(&p))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Removes the latest product of the open reception. Empty 200 on success.
pub async fn delete_last(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RoleContext>,
    Path(pvz_id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&ctx, &Permission::PRODUCTS_DELETE) {
        return resp;
    }
    let pvz = match dto::parse_pickup_point_id(&pvz_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.delete_last_product(pvz).await {
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
