//! Reception ledger: the open/close/append/remove lifecycle of receptions.
//!
//! Invariants, per pickup point, at every commit:
//! - at most one reception is `in_progress`;
//! - products are only inserted into the reception in progress;
//! - only the most recent product (by `date_time`, then insertion order) is removed;
//! - a closed reception is never reopened nor modified.
//!
//! The Postgres implementation enforces these with transactions and row locks
//! so that several service processes can share one database. There is no
//! in-process locking on that path.

use async_trait::async_trait;
use thiserror::Error;

use pvz_core::PickupPointId;
use pvz_receptions::{LedgerViolation, Product, ProductType, Reception};

use crate::db::{self, SqlFailure};

pub mod postgres;

pub use postgres::PostgresReceptionLedger;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Expected business outcome; never retry.
    #[error(transparent)]
    Rule(#[from] LedgerViolation),

    /// Lock wait exceeded, deadlock, or serialization failure. Safe to retry.
    #[error("{operation} on pickup point {pickup_point_id} hit lock contention: {message}")]
    Contention {
        operation: &'static str,
        pickup_point_id: PickupPointId,
        message: String,
    },

    #[error("{operation} on pickup point {pickup_point_id} failed: {message}")]
    Store {
        operation: &'static str,
        pickup_point_id: PickupPointId,
        message: String,
    },
}

impl LedgerError {
    pub fn store(
        operation: &'static str,
        pickup_point_id: PickupPointId,
        message: impl Into<String>,
    ) -> Self {
        Self::Store {
            operation,
            pickup_point_id,
            message: message.into(),
        }
    }

    /// Classify a sqlx error raised by `operation`.
    pub(crate) fn from_sqlx(
        operation: &'static str,
        pickup_point_id: PickupPointId,
        err: sqlx::Error,
    ) -> Self {
        let message = db::describe(operation, &err);
        match db::classify(&err) {
            SqlFailure::Contention => Self::Contention {
                operation,
                pickup_point_id,
                message,
            },
            _ => Self::Store {
                operation,
                pickup_point_id,
                message,
            },
        }
    }

    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Contention { .. })
    }

    pub fn violation(&self) -> Option<&LedgerViolation> {
        match self {
            Self::Rule(v) => Some(v),
            _ => None,
        }
    }
}

/// Mutating operations on receptions and their products.
///
/// Every method is scoped to a single pickup point; operations on different
/// pickup points never contend.
#[async_trait]
pub trait ReceptionLedger: Send + Sync {
    /// Open a reception, unless one is already in progress.
    ///
    /// Fails with `ReceptionAlreadyOpen` or `PickupPointNotFound`.
    async fn open_reception(&self, pickup_point_id: PickupPointId) -> LedgerResult<Reception>;

    /// Close the reception in progress. Fails with `NoOpenReception`.
    async fn close_last_open_reception(
        &self,
        pickup_point_id: PickupPointId,
    ) -> LedgerResult<Reception>;

    /// Record a product in the reception in progress.
    ///
    /// Fails with `NoActiveReception`; nothing is written in that case.
    async fn append_product(
        &self,
        pickup_point_id: PickupPointId,
        product_type: ProductType,
    ) -> LedgerResult<Product>;

    /// Delete and return the most recent product of the reception in progress.
    ///
    /// Fails with `NoActiveReception` or `NoProductToDelete`.
    async fn remove_last_product(&self, pickup_point_id: PickupPointId) -> LedgerResult<Product>;

    async fn active_reception(
        &self,
        pickup_point_id: PickupPointId,
    ) -> LedgerResult<Option<Reception>>;

    /// Most recent product of the reception in progress, if any.
    async fn last_product(&self, pickup_point_id: PickupPointId) -> LedgerResult<Option<Product>>;
}
