use thiserror::Error;

use crate::{Permission, Role, permissions_for};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: role '{role}' lacks permission '{permission}'")]
    Forbidden { role: Role, permission: String },
}

/// Check that `role` is granted `required`.
///
/// Pure policy check: no IO, no panics.
pub fn authorize(role: Role, required: &Permission) -> Result<(), AuthzError> {
    if permissions_for(role).contains(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden {
            role,
            permission: required.as_str().to_string(),
        })
    }
}
