use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use pvz_auth::Permission;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::RoleContext;

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RoleContext>,
    Json(body): Json<dto::CreatePickupPointRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&ctx, &Permission::PICKUP_POINTS_CREATE) {
        return resp;
    }
    let city = match dto::parse_city(&body.city) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match services.create_pickup_point(city).await {
        Ok(p) => (StatusCode::CREATED, Json(dto::pickup_point_to_json(&p))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RoleContext>,
    Query(query): Query<dto::ListQuery>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&ctx, &Permission::PICKUP_POINTS_LIST) {
        return resp;
    }
    let (filter, page) = match (query.filter(), query.page()) {
        (Ok(f), Ok(p)) => (f, p),
        (Err(resp), _) | (_, Err(resp)) => return resp,
    };

    match services.list_pickup_points(filter, page).await {
        Ok(items) => {
            let body: Vec<_> = items.iter().map(dto::summary_to_json).collect();
            Json(body).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}
