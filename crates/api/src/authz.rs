//! Route-level authorization guard.
//!
//! Checked in handlers before any ledger or registry call; the ledger itself
//! knows nothing about roles.

use axum::http::StatusCode;

use pvz_auth::{Permission, authorize};

use crate::app::errors;
use crate::context::RoleContext;

/// Require `permission` for the current caller, or produce a 403 response.
pub fn require(ctx: &RoleContext, permission: &Permission) -> Result<(), axum::response::Response> {
    authorize(ctx.role(), permission).map_err(|e| {
        tracing::info!(role = %ctx.role(), permission = %permission, "forbidden");
        errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string())
    })
}
