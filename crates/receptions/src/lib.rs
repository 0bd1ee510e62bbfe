//! Reception and product domain module.
//!
//! Contains the reception lifecycle rules as deterministic logic (no IO).
//! `ReceptionBatch` is the single-process model of those rules; the Postgres
//! ledger in `pvz-infra` enforces the same rules with row locks.

pub mod batch;
pub mod product;
pub mod reception;
pub mod violation;

pub use batch::ReceptionBatch;
pub use product::{Product, ProductType};
pub use reception::{Reception, ReceptionStatus};
pub use violation::LedgerViolation;
