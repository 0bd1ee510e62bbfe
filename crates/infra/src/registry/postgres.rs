//! Postgres-backed pickup point registry.
//!
//! The listing runs in a `REPEATABLE READ, READ ONLY` transaction so the three
//! queries (pickup points, receptions, products) see one snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{Span, instrument};
use uuid::Uuid;

use pvz_core::{PickupPointId, ReceptionId};
use pvz_pickup_points::{City, PickupPoint};
use pvz_receptions::{Product, Reception};

use super::{
    ListFilter, Page, PickupPointRegistry, PickupPointSummary, ReceptionWithProducts,
    RegistryError, RegistryResult,
};
use crate::rows::{self, PickupPointRow, ProductRow, ReceptionRow};

#[derive(Debug, Clone)]
pub struct PostgresPickupPointRegistry {
    pool: Arc<PgPool>,
}

impl PostgresPickupPointRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    #[instrument(skip(self), fields(city = %city), err)]
    pub async fn create(&self, city: City) -> RegistryResult<PickupPoint> {
        const OP: &str = "create_pickup_point";
        let row = sqlx::query(
            r#"
            INSERT INTO pickup_points (id, registration_date, city)
            VALUES ($1, now(), $2)
            RETURNING id, registration_date, city
            "#,
        )
        .bind(Uuid::from(PickupPointId::new()))
        .bind(city.as_str())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| RegistryError::from_sqlx(OP, e))?;

        rows::decode::<PickupPointRow, PickupPoint>(&row).map_err(|m| RegistryError::store(OP, m))
    }

    #[instrument(skip(self), fields(pickup_point_id = %id), err)]
    pub async fn find(&self, id: PickupPointId) -> RegistryResult<Option<PickupPoint>> {
        const OP: &str = "find_pickup_point";
        let row = sqlx::query("SELECT id, registration_date, city FROM pickup_points WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| RegistryError::from_sqlx(OP, e))?;

        row.map(|r| {
            rows::decode::<PickupPointRow, PickupPoint>(&r).map_err(|m| RegistryError::store(OP, m))
        })
        .transpose()
    }

    #[instrument(skip(self), fields(page = ?page, returned = tracing::field::Empty), err)]
    pub async fn list(
        &self,
        filter: ListFilter,
        page: Page,
    ) -> RegistryResult<Vec<PickupPointSummary>> {
        const OP: &str = "list_pickup_points";
        let start: Option<DateTime<Utc>> = filter.start();
        let end: Option<DateTime<Utc>> = filter.end();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RegistryError::from_sqlx(OP, e))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| RegistryError::from_sqlx(OP, e))?;

        let point_rows = sqlx::query(
            r#"
            SELECT p.id, p.registration_date, p.city
            FROM pickup_points p
            WHERE NOT $1
               OR EXISTS (
                    SELECT 1 FROM receptions r
                    WHERE r.pickup_point_id = p.id
                      AND ($2::timestamptz IS NULL OR r.date_time >= $2)
                      AND ($3::timestamptz IS NULL OR r.date_time <= $3)
               )
            ORDER BY p.registration_date ASC, p.id ASC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(filter.is_windowed())
        .bind(start)
        .bind(end)
        .bind(i64::from(page.limit()))
        .bind(page.offset() as i64)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| RegistryError::from_sqlx(OP, e))?;

        let mut points = Vec::with_capacity(point_rows.len());
        for row in &point_rows {
            points.push(
                rows::decode::<PickupPointRow, PickupPoint>(row)
                    .map_err(|m| RegistryError::store(OP, m))?,
            );
        }
        if points.is_empty() {
            tx.commit().await.map_err(|e| RegistryError::from_sqlx(OP, e))?;
            return Ok(Vec::new());
        }

        let point_ids: Vec<Uuid> = points.iter().map(|p| *p.id.as_uuid()).collect();
        let reception_rows = sqlx::query(
            r#"
            SELECT id, pickup_point_id, date_time, status, closed_at
            FROM receptions
            WHERE pickup_point_id = ANY($1)
              AND ($2::timestamptz IS NULL OR date_time >= $2)
              AND ($3::timestamptz IS NULL OR date_time <= $3)
            ORDER BY date_time ASC, id ASC
            "#,
        )
        .bind(&point_ids)
        .bind(start)
        .bind(end)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| RegistryError::from_sqlx(OP, e))?;

        let mut receptions: Vec<Reception> = Vec::with_capacity(reception_rows.len());
        for row in &reception_rows {
            receptions.push(
                rows::decode::<ReceptionRow, Reception>(row)
                    .map_err(|m| RegistryError::store(OP, m))?,
            );
        }

        let reception_ids: Vec<Uuid> = receptions.iter().map(|r| *r.id.as_uuid()).collect();
        let product_rows = sqlx::query(
            r#"
            SELECT id, reception_id, product_type, date_time
            FROM products
            WHERE reception_id = ANY($1)
            ORDER BY date_time ASC, seq ASC
            "#,
        )
        .bind(&reception_ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| RegistryError::from_sqlx(OP, e))?;

        tx.commit().await.map_err(|e| RegistryError::from_sqlx(OP, e))?;

        let mut products_by_reception: HashMap<ReceptionId, Vec<Product>> = HashMap::new();
        for row in &product_rows {
            let product = rows::decode::<ProductRow, Product>(row)
                .map_err(|m| RegistryError::store(OP, m))?;
            products_by_reception
                .entry(product.reception_id)
                .or_default()
                .push(product);
        }

        let summaries = assemble(points, receptions, products_by_reception);
        Span::current().record("returned", summaries.len());
        Ok(summaries)
    }
}

/// Nest receptions under their pickup points and products under their receptions,
/// keeping the input order at each level.
pub(crate) fn assemble(
    points: Vec<PickupPoint>,
    receptions: Vec<Reception>,
    mut products_by_reception: HashMap<ReceptionId, Vec<Product>>,
) -> Vec<PickupPointSummary> {
    let mut receptions_by_point: HashMap<PickupPointId, Vec<ReceptionWithProducts>> = HashMap::new();
    for reception in receptions {
        let products = products_by_reception.remove(&reception.id).unwrap_or_default();
        receptions_by_point
            .entry(reception.pickup_point_id)
            .or_default()
            .push(ReceptionWithProducts { reception, products });
    }

    points
        .into_iter()
        .map(|pickup_point| PickupPointSummary {
            receptions: receptions_by_point.remove(&pickup_point.id).unwrap_or_default(),
            pickup_point,
        })
        .collect()
}

#[async_trait]
impl PickupPointRegistry for PostgresPickupPointRegistry {
    async fn create_pickup_point(&self, city: City) -> RegistryResult<PickupPoint> {
        self.create(city).await
    }

    async fn find_pickup_point(&self, id: PickupPointId) -> RegistryResult<Option<PickupPoint>> {
        self.find(id).await
    }

    async fn list_pickup_points(
        &self,
        filter: ListFilter,
        page: Page,
    ) -> RegistryResult<Vec<PickupPointSummary>> {
        self.list(filter, page).await
    }
}
