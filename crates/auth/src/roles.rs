use core::str::FromStr;

use serde::{Deserialize, Serialize};

use pvz_core::DomainError;

/// Caller role carried in the access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Pickup point staff: runs receptions and records products.
    Employee,
    /// Registers pickup points.
    Moderator,
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Moderator => "moderator",
            Role::Client => "client",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "employee" => Ok(Role::Employee),
            "moderator" => Ok(Role::Moderator),
            "client" => Ok(Role::Client),
            other => Err(DomainError::validation(format!("unknown role '{other}'"))),
        }
    }
}
