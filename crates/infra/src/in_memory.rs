//! In-memory store implementing both the ledger and the registry.
//!
//! Intended for tests/dev. All tables sit behind one `RwLock`, which plays the
//! part of the database's lock manager: each operation is a single critical
//! section, so operations are trivially serializable. It is an alternative
//! store, not a lock layered on top of Postgres.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use pvz_core::{Entity, PickupPointId};
use pvz_pickup_points::{City, PickupPoint};
use pvz_receptions::{LedgerViolation, Product, ProductType, Reception, ReceptionBatch};

use crate::ledger::{LedgerError, LedgerResult, ReceptionLedger};
use crate::registry::{
    ListFilter, Page, PickupPointRegistry, PickupPointSummary, ReceptionWithProducts,
    RegistryError, RegistryResult,
};

#[derive(Debug, Default)]
struct Tables {
    /// Registration order, which is also listing order.
    pickup_points: Vec<PickupPoint>,
    /// Per pickup point, batches in opening order. Only the last can be open.
    batches: HashMap<PickupPointId, Vec<ReceptionBatch>>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the open batch of `pickup_point_id` under the write lock.
    fn with_open_batch<T>(
        &self,
        operation: &'static str,
        pickup_point_id: PickupPointId,
        missing: LedgerViolation,
        f: impl FnOnce(&mut ReceptionBatch) -> Result<T, LedgerViolation>,
    ) -> LedgerResult<T> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| LedgerError::store(operation, pickup_point_id, "lock poisoned"))?;

        let batch = tables
            .batches
            .get_mut(&pickup_point_id)
            .and_then(|history| history.last_mut())
            .filter(|b| b.is_open())
            .ok_or(missing)?;

        Ok(f(batch)?)
    }

    fn read<T>(
        &self,
        operation: &'static str,
        pickup_point_id: PickupPointId,
        f: impl FnOnce(Option<&ReceptionBatch>) -> T,
    ) -> LedgerResult<T> {
        let tables = self
            .tables
            .read()
            .map_err(|_| LedgerError::store(operation, pickup_point_id, "lock poisoned"))?;

        let open = tables
            .batches
            .get(&pickup_point_id)
            .and_then(|history| history.last())
            .filter(|b| b.is_open());
        Ok(f(open))
    }
}

#[async_trait]
impl ReceptionLedger for InMemoryStore {
    async fn open_reception(&self, pickup_point_id: PickupPointId) -> LedgerResult<Reception> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| LedgerError::store("open_reception", pickup_point_id, "lock poisoned"))?;

        if !tables.pickup_points.iter().any(|p| p.id() == pickup_point_id) {
            return Err(LedgerViolation::PickupPointNotFound { pickup_point_id }.into());
        }

        let history = tables.batches.entry(pickup_point_id).or_default();
        let batch = ReceptionBatch::open_after(history, pickup_point_id, Utc::now())?;
        let reception = batch.reception().clone();
        history.push(batch);

        tracing::debug!(%pickup_point_id, reception_id = %reception.id, "reception opened");
        Ok(reception)
    }

    async fn close_last_open_reception(
        &self,
        pickup_point_id: PickupPointId,
    ) -> LedgerResult<Reception> {
        self.with_open_batch(
            "close_last_open_reception",
            pickup_point_id,
            LedgerViolation::NoOpenReception { pickup_point_id },
            |batch| batch.close(Utc::now()).cloned(),
        )
    }

    async fn append_product(
        &self,
        pickup_point_id: PickupPointId,
        product_type: ProductType,
    ) -> LedgerResult<Product> {
        self.with_open_batch(
            "append_product",
            pickup_point_id,
            LedgerViolation::NoActiveReception { pickup_point_id },
            |batch| batch.accept(product_type, Utc::now()),
        )
    }

    async fn remove_last_product(&self, pickup_point_id: PickupPointId) -> LedgerResult<Product> {
        self.with_open_batch(
            "remove_last_product",
            pickup_point_id,
            LedgerViolation::NoActiveReception { pickup_point_id },
            ReceptionBatch::pop_last,
        )
    }

    async fn active_reception(
        &self,
        pickup_point_id: PickupPointId,
    ) -> LedgerResult<Option<Reception>> {
        self.read("active_reception", pickup_point_id, |open| {
            open.map(|b| b.reception().clone())
        })
    }

    async fn last_product(&self, pickup_point_id: PickupPointId) -> LedgerResult<Option<Product>> {
        self.read("last_product", pickup_point_id, |open| {
            open.and_then(|b| b.last_product().cloned())
        })
    }
}

#[async_trait]
impl PickupPointRegistry for InMemoryStore {
    async fn create_pickup_point(&self, city: City) -> RegistryResult<PickupPoint> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| RegistryError::store("create_pickup_point", "lock poisoned"))?;

        let pickup_point = PickupPoint::register(city, Utc::now());
        tables.pickup_points.push(pickup_point.clone());
        Ok(pickup_point)
    }

    async fn find_pickup_point(&self, id: PickupPointId) -> RegistryResult<Option<PickupPoint>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| RegistryError::store("find_pickup_point", "lock poisoned"))?;

        Ok(tables.pickup_points.iter().find(|p| p.id() == id).cloned())
    }

    async fn list_pickup_points(
        &self,
        filter: ListFilter,
        page: Page,
    ) -> RegistryResult<Vec<PickupPointSummary>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| RegistryError::store("list_pickup_points", "lock poisoned"))?;

        let summaries = tables
            .pickup_points
            .iter()
            .filter_map(|pickup_point| {
                let receptions: Vec<ReceptionWithProducts> = tables
                    .batches
                    .get(&pickup_point.id)
                    .into_iter()
                    .flatten()
                    .filter(|b| filter.contains(b.reception().date_time))
                    .map(|b| ReceptionWithProducts {
                        reception: b.reception().clone(),
                        products: b.products().to_vec(),
                    })
                    .collect();

                if filter.is_windowed() && receptions.is_empty() {
                    return None;
                }
                Some(PickupPointSummary {
                    pickup_point: pickup_point.clone(),
                    receptions,
                })
            })
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();

        Ok(summaries)
    }
}
