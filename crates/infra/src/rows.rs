//! SQLx row types shared by the Postgres adapters.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;

use pvz_core::{PickupPointId, ProductId, ReceptionId};
use pvz_pickup_points::PickupPoint;
use pvz_receptions::{Product, Reception};

#[derive(Debug)]
pub(crate) struct PickupPointRow {
    id: uuid::Uuid,
    registration_date: DateTime<Utc>,
    city: String,
}

impl<'r> sqlx::FromRow<'r, PgRow> for PickupPointRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(PickupPointRow {
            id: row.try_get("id")?,
            registration_date: row.try_get("registration_date")?,
            city: row.try_get("city")?,
        })
    }
}

impl TryFrom<PickupPointRow> for PickupPoint {
    type Error = String;

    fn try_from(row: PickupPointRow) -> Result<Self, Self::Error> {
        Ok(PickupPoint {
            id: PickupPointId::from_uuid(row.id),
            registration_date: row.registration_date,
            city: row.city.parse().map_err(|e| format!("pickup point {}: {e}", row.id))?,
        })
    }
}

#[derive(Debug)]
pub(crate) struct ReceptionRow {
    id: uuid::Uuid,
    pickup_point_id: uuid::Uuid,
    date_time: DateTime<Utc>,
    status: String,
    closed_at: Option<DateTime<Utc>>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for ReceptionRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ReceptionRow {
            id: row.try_get("id")?,
            pickup_point_id: row.try_get("pickup_point_id")?,
            date_time: row.try_get("date_time")?,
            status: row.try_get("status")?,
            closed_at: row.try_get("closed_at")?,
        })
    }
}

impl TryFrom<ReceptionRow> for Reception {
    type Error = String;

    fn try_from(row: ReceptionRow) -> Result<Self, Self::Error> {
        Ok(Reception {
            id: ReceptionId::from_uuid(row.id),
            date_time: row.date_time,
            pickup_point_id: PickupPointId::from_uuid(row.pickup_point_id),
            status: row.status.parse().map_err(|e| format!("reception {}: {e}", row.id))?,
            closed_at: row.closed_at,
        })
    }
}

#[derive(Debug)]
pub(crate) struct ProductRow {
    id: uuid::Uuid,
    reception_id: uuid::Uuid,
    product_type: String,
    date_time: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            reception_id: row.try_get("reception_id")?,
            product_type: row.try_get("product_type")?,
            date_time: row.try_get("date_time")?,
        })
    }
}

impl TryFrom<ProductRow> for Product {
    type Error = String;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: ProductId::from_uuid(row.id),
            date_time: row.date_time,
            product_type: row
                .product_type
                .parse()
                .map_err(|e| format!("product {}: {e}", row.id))?,
            reception_id: ReceptionId::from_uuid(row.reception_id),
        })
    }
}

/// Decode a row and convert it into its domain type.
pub(crate) fn decode<R, T>(row: &PgRow) -> Result<T, String>
where
    R: for<'r> sqlx::FromRow<'r, PgRow>,
    T: TryFrom<R, Error = String>,
{
    let raw = R::from_row(row).map_err(|e| format!("failed to deserialize row: {e}"))?;
    T::try_from(raw)
}
