use axum::{routing::post, Router};

pub mod pickup_points;
pub mod products;
pub mod receptions;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/pvz", post(pickup_points::create).get(pickup_points::list))
        .route("/receptions", post(receptions::open))
        .route("/products", post(products::add))
        .route("/pvz/:pvzId/close_last_reception", post(receptions::close_last))
        .route("/pvz/:pvzId/delete_last_product", post(products::delete_last))
}
