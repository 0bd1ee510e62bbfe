//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: ledger/registry wiring and the operation deadline
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request DTOs, input parsing, and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower::ServiceBuilder;

use pvz_auth::Hs256Jwt;
use pvz_infra::config::JwtConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<services::AppServices>, jwt: Arc<Hs256Jwt>) -> Router {
    let auth_state = middleware::AuthState { jwt: jwt.clone() };

    // Protected routes: require a valid bearer token.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/dummyLogin", post(routes::system::dummy_login))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(Extension(jwt)))
}

/// HS256 signer/validator for the configured secret and token lifetime.
pub fn jwt_from_config(config: &JwtConfig) -> anyhow::Result<Arc<Hs256Jwt>> {
    let ttl = chrono::Duration::from_std(config.ttl)?;
    Ok(Arc::new(Hs256Jwt::new(config.secret.as_bytes(), ttl)))
}
