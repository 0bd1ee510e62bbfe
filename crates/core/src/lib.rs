//! `pvz-core`: shared domain building blocks.
//!
//! Identifiers and the domain error model. No infrastructure concerns live here.

pub mod entity;
pub mod error;
pub mod id;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{PickupPointId, ProductId, ReceptionId};
