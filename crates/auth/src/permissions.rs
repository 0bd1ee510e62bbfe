use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Permission identifier (e.g. "receptions.open").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const PICKUP_POINTS_CREATE: Permission = Permission(Cow::Borrowed("pickup_points.create"));
    pub const PICKUP_POINTS_LIST: Permission = Permission(Cow::Borrowed("pickup_points.list"));
    pub const RECEPTIONS_OPEN: Permission = Permission(Cow::Borrowed("receptions.open"));
    pub const RECEPTIONS_CLOSE: Permission = Permission(Cow::Borrowed("receptions.close"));
    pub const PRODUCTS_ADD: Permission = Permission(Cow::Borrowed("products.add"));
    pub const PRODUCTS_DELETE: Permission = Permission(Cow::Borrowed("products.delete"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

const MODERATOR: &[Permission] = &[
    Permission::PICKUP_POINTS_CREATE,
    Permission::PICKUP_POINTS_LIST,
];

const EMPLOYEE: &[Permission] = &[
    Permission::PICKUP_POINTS_LIST,
    Permission::RECEPTIONS_OPEN,
    Permission::RECEPTIONS_CLOSE,
    Permission::PRODUCTS_ADD,
    Permission::PRODUCTS_DELETE,
];

/// Role → permission policy.
pub fn permissions_for(role: Role) -> &'static [Permission] {
    match role {
        Role::Moderator => MODERATOR,
        Role::Employee => EMPLOYEE,
        Role::Client => &[],
    }
}
