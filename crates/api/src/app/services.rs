//! Application service facade.
//!
//! Translates requests into ledger/registry calls and bounds each call by the
//! operation deadline. When the deadline fires, the in-flight future (and any
//! open transaction inside it) is dropped, which rolls the transaction back.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::instrument;

use pvz_core::PickupPointId;
use pvz_infra::config::AppConfig;
use pvz_infra::{
    InMemoryStore, LedgerError, ListFilter, Page, PickupPointRegistry, PickupPointSummary,
    PostgresPickupPointRegistry, PostgresReceptionLedger, ReceptionLedger, RegistryError, db,
};
use pvz_pickup_points::{City, PickupPoint};
use pvz_receptions::{Product, ProductType, Reception};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("{operation} did not finish within the deadline")]
    Timeout { operation: &'static str },
}

pub struct AppServices {
    ledger: Arc<dyn ReceptionLedger>,
    registry: Arc<dyn PickupPointRegistry>,
    operation_timeout: Duration,
}

impl AppServices {
    pub fn new(
        ledger: Arc<dyn ReceptionLedger>,
        registry: Arc<dyn PickupPointRegistry>,
        operation_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            registry,
            operation_timeout,
        }
    }

    /// Services backed by a fresh in-memory store (dev/tests).
    pub fn in_memory(operation_timeout: Duration) -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self::new(store.clone(), store, operation_timeout)
    }

    #[instrument(skip(self))]
    pub async fn create_pickup_point(&self, city: City) -> Result<PickupPoint, ServiceError> {
        let res = self
            .deadline("create_pickup_point", self.registry.create_pickup_point(city))
            .await;
        match &res {
            Ok(p) => tracing::info!(pickup_point_id = %p.id, city = %p.city, "pickup point registered"),
            Err(e) => log_failure("create_pickup_point", None, e),
        }
        res
    }

    #[instrument(skip(self))]
    pub async fn list_pickup_points(
        &self,
        filter: ListFilter,
        page: Page,
    ) -> Result<Vec<PickupPointSummary>, ServiceError> {
        let res = self
            .deadline("list_pickup_points", self.registry.list_pickup_points(filter, page))
            .await;
        if let Err(e) = &res {
            log_failure("list_pickup_points", None, e);
        }
        res
    }

    #[instrument(skip(self))]
    pub async fn open_reception(&self, pickup_point_id: PickupPointId) -> Result<Reception, ServiceError> {
        let res = self
            .deadline("open_reception", self.ledger.open_reception(pickup_point_id))
            .await;
        match &res {
            Ok(r) => tracing::info!(%pickup_point_id, reception_id = %r.id, "reception opened"),
            Err(e) => log_failure("open_reception", Some(pickup_point_id), e),
        }
        res
    }

    #[instrument(skip(self))]
    pub async fn close_last_reception(&self, pickup_point_id: PickupPointId) -> Result<Reception, ServiceError> {
        let res = self
            .deadline(
                "close_last_open_reception",
                self.ledger.close_last_open_reception(pickup_point_id),
            )
            .await;
        match &res {
            Ok(r) => tracing::info!(%pickup_point_id, reception_id = %r.id, "reception closed"),
            Err(e) => log_failure("close_last_open_reception", Some(pickup_point_id), e),
        }
        res
    }

    #[instrument(skip(self))]
    pub async fn add_product(
        &self,
        pickup_point_id: PickupPointId,
        product_type: ProductType,
    ) -> Result<Product, ServiceError> {
        let res = self
            .deadline(
                "append_product",
                self.ledger.append_product(pickup_point_id, product_type),
            )
            .await;
        match &res {
            Ok(p) => tracing::debug!(%pickup_point_id, product_id = %p.id, "product added"),
            Err(e) => log_failure("append_product", Some(pickup_point_id), e),
        }
        res
    }

    #[instrument(skip(self))]
    pub async fn delete_last_product(&self, pickup_point_id: PickupPointId) -> Result<Product, ServiceError> {
        let res = self
            .deadline(
                "remove_last_product",
                self.ledger.remove_last_product(pickup_point_id),
            )
            .await;
        match &res {
            Ok(p) => tracing::info!(%pickup_point_id, product_id = %p.id, "last product removed"),
            Err(e) => log_failure("remove_last_product", Some(pickup_point_id), e),
        }
        res
    }

    async fn deadline<T, E, F>(&self, operation: &'static str, fut: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<ServiceError>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(res) => res.map_err(Into::into),
            Err(_) => Err(ServiceError::Timeout { operation }),
        }
    }
}

fn log_failure(operation: &'static str, pickup_point_id: Option<PickupPointId>, err: &ServiceError) {
    let pickup_point_id = pickup_point_id.map(tracing::field::display);
    match err {
        ServiceError::Ledger(LedgerError::Rule(v)) => {
            tracing::info!(operation, pickup_point_id, code = v.code(), "rejected by ledger rule")
        }
        ServiceError::Ledger(e @ LedgerError::Contention { .. }) => {
            tracing::warn!(operation, pickup_point_id, error = %e, "lock contention")
        }
        ServiceError::Timeout { .. } => {
            tracing::warn!(operation, pickup_point_id, "deadline exceeded; transaction rolled back")
        }
        e => tracing::error!(operation, pickup_point_id, error = %e, "operation failed"),
    }
}

/// Wire the services for `config`: Postgres when a database is configured,
/// the in-memory store otherwise.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let timeout = config.ledger.operation_timeout;
    let Some(database) = &config.database else {
        tracing::warn!("DATABASE_URL not set; using the in-memory store");
        return Ok(AppServices::in_memory(timeout));
    };

    let pool = db::connect(database).await?;
    db::migrate(&pool).await?;
    tracing::info!(max_connections = database.max_connections, "connected to postgres");

    Ok(AppServices::new(
        Arc::new(PostgresReceptionLedger::new(pool.clone(), config.ledger.lock_timeout)),
        Arc::new(PostgresPickupPointRegistry::new(pool)),
        timeout,
    ))
}
