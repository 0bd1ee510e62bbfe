//! `pvz-auth`: credential → role → permission boundary.
//!
//! Decoupled from HTTP and storage. The ledger never sees anything from here:
//! roles are checked at the routing layer before a ledger call is made.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod roles;

pub use authorize::{AuthzError, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256Jwt, JwtValidator, TokenError, TokenIssuer};
pub use permissions::{Permission, permissions_for};
pub use roles::Role;
