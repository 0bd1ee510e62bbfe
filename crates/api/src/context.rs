use pvz_auth::Role;

/// Authenticated caller context, derived from the access token.
///
/// Inserted by the auth middleware; present on every protected route.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RoleContext {
    role: Role,
}

impl RoleContext {
    pub fn new(role: Role) -> Self {
        Self { role }
    }

    pub fn role(&self) -> Role {
        self.role
    }
}
