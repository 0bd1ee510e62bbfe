//! Postgres-backed reception ledger.
//!
//! ## Locking protocol
//!
//! | Operation | Lock taken | Serializes against |
//! |-----------|------------|--------------------|
//! | open | `pickup_points` row `FOR UPDATE` | other openers of the same pickup point |
//! | close | in-progress `receptions` row `FOR UPDATE` | appenders, removers, other closers |
//! | append | in-progress `receptions` row `FOR SHARE` | closers only |
//! | remove | reception `FOR SHARE`, then the latest product only, `FOR UPDATE SKIP LOCKED` | closers; a remover finding it held reports `NoProductToDelete` |
//!
//! Every transaction sets a local `lock_timeout`, so waits are bounded and
//! surface as [`LedgerError::Contention`]. The partial unique index
//! `receptions_one_in_progress_per_pickup_point` backs the open invariant at
//! the storage level.
//!
//! ## Error mapping
//!
//! | SQLSTATE | Where | Result |
//! |----------|-------|--------|
//! | `23505` on the in-progress index | open | `ReceptionAlreadyOpen` |
//! | `23503` | open | `PickupPointNotFound` |
//! | `55P03`, `40P01`, `40001` | any | `Contention` |
//! | anything else | any | `Store` |
//!
//! Dropping an uncommitted transaction (e.g. when the caller's deadline
//! cancels the future) rolls it back.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use pvz_core::{PickupPointId, ProductId, ReceptionId};
use pvz_receptions::{LedgerViolation, Product, ProductType, Reception, ReceptionStatus};

use super::{LedgerError, LedgerResult, ReceptionLedger};
use crate::db::{self, SqlFailure};
use crate::rows::{self, ProductRow, ReceptionRow};

const OPEN_INDEX: &str = "receptions_one_in_progress_per_pickup_point";

const RECEPTION_COLUMNS: &str = "id, pickup_point_id, date_time, status, closed_at";
const PRODUCT_COLUMNS: &str = "id, reception_id, product_type, date_time";

#[derive(Debug, Clone)]
pub struct PostgresReceptionLedger {
    pool: Arc<PgPool>,
    lock_timeout: Duration,
}

impl PostgresReceptionLedger {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self {
            pool: Arc::new(pool),
            lock_timeout,
        }
    }

    async fn begin(
        &self,
        operation: &'static str,
        pickup_point_id: PickupPointId,
    ) -> LedgerResult<Transaction<'static, Postgres>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LedgerError::from_sqlx(operation, pickup_point_id, e))?;
        db::set_lock_timeout(&mut tx, self.lock_timeout)
            .await
            .map_err(|e| LedgerError::from_sqlx(operation, pickup_point_id, e))?;
        Ok(tx)
    }

    #[instrument(skip(self), fields(pickup_point_id = %pickup_point_id, operation = "open_reception", reception_id = tracing::field::Empty), err)]
    pub async fn open(&self, pickup_point_id: PickupPointId) -> LedgerResult<Reception> {
        const OP: &str = "open_reception";
        let mut tx = self.begin(OP, pickup_point_id).await?;

        // Serializes openers of this pickup point; other pickup points are untouched.
        let pickup_point = sqlx::query("SELECT id FROM pickup_points WHERE id = $1 FOR UPDATE")
            .bind(pickup_point_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| LedgerError::from_sqlx(OP, pickup_point_id, e))?;
        if pickup_point.is_none() {
            return reject(tx, OP, LedgerViolation::PickupPointNotFound { pickup_point_id }).await;
        }

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO receptions (id, pickup_point_id, date_time, status)
            SELECT $1, $2, now(), $3
            WHERE NOT EXISTS (
                SELECT 1 FROM receptions
                WHERE pickup_point_id = $2 AND status = $3
            )
            RETURNING {RECEPTION_COLUMNS}
            "#
        ))
        .bind(Uuid::from(ReceptionId::new()))
        .bind(pickup_point_id.as_uuid())
        .bind(ReceptionStatus::InProgress.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| match db::classify(&e) {
            SqlFailure::UniqueViolation(Some(ref c)) if c == OPEN_INDEX => {
                LedgerViolation::ReceptionAlreadyOpen { pickup_point_id }.into()
            }
            SqlFailure::ForeignKeyViolation => {
                LedgerViolation::PickupPointNotFound { pickup_point_id }.into()
            }
            _ => LedgerError::from_sqlx(OP, pickup_point_id, e),
        })?;

        let Some(row) = row else {
            return reject(tx, OP, LedgerViolation::ReceptionAlreadyOpen { pickup_point_id }).await;
        };
        let reception = decode_reception(OP, pickup_point_id, &row)?;

        commit(tx, OP, pickup_point_id).await?;
        Span::current().record("reception_id", tracing::field::display(reception.id));
        Ok(reception)
    }

    #[instrument(skip(self), fields(pickup_point_id = %pickup_point_id, operation = "close_last_open_reception"), err)]
    pub async fn close(&self, pickup_point_id: PickupPointId) -> LedgerResult<Reception> {
        const OP: &str = "close_last_open_reception";
        let mut tx = self.begin(OP, pickup_point_id).await?;

        // A concurrent closer blocks here; once the first commits, the row no
        // longer matches `status = in_progress` and the second sees nothing.
        let Some(reception_id) = lock_in_progress(&mut tx, OP, pickup_point_id, "FOR UPDATE").await?
        else {
            return reject(tx, OP, LedgerViolation::NoOpenReception { pickup_point_id }).await;
        };

        let row = sqlx::query(&format!(
            r#"
            UPDATE receptions
            SET status = $2, closed_at = now()
            WHERE id = $1 AND status = $3
            RETURNING {RECEPTION_COLUMNS}
            "#
        ))
        .bind(reception_id)
        .bind(ReceptionStatus::Closed.as_str())
        .bind(ReceptionStatus::InProgress.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| LedgerError::from_sqlx(OP, pickup_point_id, e))?;

        let Some(row) = row else {
            return reject(tx, OP, LedgerViolation::NoOpenReception { pickup_point_id }).await;
        };
        let reception = decode_reception(OP, pickup_point_id, &row)?;

        commit(tx, OP, pickup_point_id).await?;
        Ok(reception)
    }

    #[instrument(skip(self), fields(pickup_point_id = %pickup_point_id, product_type = %product_type, operation = "append_product"), err)]
    pub async fn append(
        &self,
        pickup_point_id: PickupPointId,
        product_type: ProductType,
    ) -> LedgerResult<Product> {
        const OP: &str = "append_product";
        let mut tx = self.begin(OP, pickup_point_id).await?;

        // Shared lock: appenders proceed together, a closer waits for all of them.
        let Some(reception_id) = lock_in_progress(&mut tx, OP, pickup_point_id, "FOR SHARE").await?
        else {
            return reject(tx, OP, LedgerViolation::NoActiveReception { pickup_point_id }).await;
        };

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (id, reception_id, product_type, date_time)
            VALUES ($1, $2, $3, now())
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(Uuid::from(ProductId::new()))
        .bind(reception_id)
        .bind(product_type.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| LedgerError::from_sqlx(OP, pickup_point_id, e))?;
        let product = decode_product(OP, pickup_point_id, &row)?;

        commit(tx, OP, pickup_point_id).await?;
        Ok(product)
    }

    #[instrument(skip(self), fields(pickup_point_id = %pickup_point_id, operation = "remove_last_product", product_id = tracing::field::Empty), err)]
    pub async fn remove_last(&self, pickup_point_id: PickupPointId) -> LedgerResult<Product> {
        const OP: &str = "remove_last_product";
        let mut tx = self.begin(OP, pickup_point_id).await?;

        let Some(reception_id) = lock_in_progress(&mut tx, OP, pickup_point_id, "FOR SHARE").await?
        else {
            return reject(tx, OP, LedgerViolation::NoActiveReception { pickup_point_id }).await;
        };

        // Pick the newest product first, then try to lock only that row. If
        // another remover holds it, nothing comes back: older products are
        // never taken in its place.
        let row = sqlx::query(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE id = (
                SELECT id FROM products
                WHERE reception_id = $1
                ORDER BY date_time DESC, seq DESC
                LIMIT 1
            )
            FOR UPDATE SKIP LOCKED
            "#
        ))
        .bind(reception_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| LedgerError::from_sqlx(OP, pickup_point_id, e))?;

        let Some(row) = row else {
            return reject(tx, OP, LedgerViolation::NoProductToDelete { pickup_point_id }).await;
        };
        let product = decode_product(OP, pickup_point_id, &row)?;

        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(product.id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| LedgerError::from_sqlx(OP, pickup_point_id, e))?;

        commit(tx, OP, pickup_point_id).await?;
        Span::current().record("product_id", tracing::field::display(product.id));
        Ok(product)
    }

    #[instrument(skip(self), fields(pickup_point_id = %pickup_point_id), err)]
    pub async fn find_active(&self, pickup_point_id: PickupPointId) -> LedgerResult<Option<Reception>> {
        const OP: &str = "active_reception";
        let row = sqlx::query(&format!(
            "SELECT {RECEPTION_COLUMNS} FROM receptions WHERE pickup_point_id = $1 AND status = $2"
        ))
        .bind(pickup_point_id.as_uuid())
        .bind(ReceptionStatus::InProgress.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| LedgerError::from_sqlx(OP, pickup_point_id, e))?;

        row.map(|r| decode_reception(OP, pickup_point_id, &r)).transpose()
    }

    #[instrument(skip(self), fields(pickup_point_id = %pickup_point_id), err)]
    pub async fn find_last_product(&self, pickup_point_id: PickupPointId) -> LedgerResult<Option<Product>> {
        const OP: &str = "last_product";
        let row = sqlx::query(
            r#"
            SELECT p.id, p.reception_id, p.product_type, p.date_time
            FROM products p
            JOIN receptions r ON r.id = p.reception_id
            WHERE r.pickup_point_id = $1 AND r.status = $2
            ORDER BY p.date_time DESC, p.seq DESC
            LIMIT 1
            "#,
        )
        .bind(pickup_point_id.as_uuid())
        .bind(ReceptionStatus::InProgress.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| LedgerError::from_sqlx(OP, pickup_point_id, e))?;

        row.map(|r| decode_product(OP, pickup_point_id, &r)).transpose()
    }
}

/// Lock the reception in progress for `pickup_point_id` and return its id.
async fn lock_in_progress(
    tx: &mut Transaction<'_, Postgres>,
    operation: &'static str,
    pickup_point_id: PickupPointId,
    lock_clause: &'static str,
) -> LedgerResult<Option<Uuid>> {
    let row: Option<(Uuid,)> = sqlx::query_as(&format!(
        "SELECT id FROM receptions WHERE pickup_point_id = $1 AND status = $2 {lock_clause}"
    ))
    .bind(pickup_point_id.as_uuid())
    .bind(ReceptionStatus::InProgress.as_str())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| LedgerError::from_sqlx(operation, pickup_point_id, e))?;

    Ok(row.map(|(id,)| id))
}

/// Roll back and report a business outcome.
async fn reject<T>(
    tx: Transaction<'_, Postgres>,
    operation: &'static str,
    violation: LedgerViolation,
) -> LedgerResult<T> {
    let pickup_point_id = violation.pickup_point_id();
    tx.rollback()
        .await
        .map_err(|e| LedgerError::from_sqlx(operation, pickup_point_id, e))?;
    Err(violation.into())
}

async fn commit(
    tx: Transaction<'_, Postgres>,
    operation: &'static str,
    pickup_point_id: PickupPointId,
) -> LedgerResult<()> {
    tx.commit()
        .await
        .map_err(|e| LedgerError::from_sqlx(operation, pickup_point_id, e))
}

fn decode_reception(
    operation: &'static str,
    pickup_point_id: PickupPointId,
    row: &sqlx::postgres::PgRow,
) -> LedgerResult<Reception> {
    rows::decode::<ReceptionRow, Reception>(row)
        .map_err(|msg| LedgerError::store(operation, pickup_point_id, msg))
}

fn decode_product(
    operation: &'static str,
    pickup_point_id: PickupPointId,
    row: &sqlx::postgres::PgRow,
) -> LedgerResult<Product> {
    rows::decode::<ProductRow, Product>(row)
        .map_err(|msg| LedgerError::store(operation, pickup_point_id, msg))
}

#[async_trait]
impl ReceptionLedger for PostgresReceptionLedger {
    async fn open_reception(&self, pickup_point_id: PickupPointId) -> LedgerResult<Reception> {
        self.open(pickup_point_id).await
    }

    async fn close_last_open_reception(
        &self,
        pickup_point_id: PickupPointId,
    ) -> LedgerResult<Reception> {
        self.close(pickup_point_id).await
    }

    async fn append_product(
        &self,
        pickup_point_id: PickupPointId,
        product_type: ProductType,
    ) -> LedgerResult<Product> {
        self.append(pickup_point_id, product_type).await
    }

    async fn remove_last_product(&self, pickup_point_id: PickupPointId) -> LedgerResult<Product> {
        self.remove_last(pickup_point_id).await
    }

    async fn active_reception(
        &self,
        pickup_point_id: PickupPointId,
    ) -> LedgerResult<Option<Reception>> {
        self.find_active(pickup_point_id).await
    }

    async fn last_product(&self, pickup_point_id: PickupPointId) -> LedgerResult<Option<Product>> {
        self.find_last_product(pickup_point_id).await
    }
}
