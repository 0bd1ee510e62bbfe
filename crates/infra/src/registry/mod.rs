//! Pickup point registry: registration plus the denormalized listing
//! (pickup point → receptions → products).
//!
//! Reads are plain snapshot queries; no row locks are taken here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use pvz_core::{DomainError, DomainResult, PickupPointId};
use pvz_pickup_points::{City, PickupPoint};
use pvz_receptions::{Product, Reception};

use crate::db;

pub mod postgres;

pub use postgres::PostgresPickupPointRegistry;

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{operation} failed: {message}")]
    Store {
        operation: &'static str,
        message: String,
    },
}

impl RegistryError {
    pub fn store(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Store {
            operation,
            message: message.into(),
        }
    }

    pub(crate) fn from_sqlx(operation: &'static str, err: sqlx::Error) -> Self {
        Self::store(operation, db::describe(operation, &err))
    }
}

/// Optional window over reception opening time (`date_time`), inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListFilter {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl ListFilter {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> DomainResult<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(DomainError::validation("startDate must not be after endDate"));
            }
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    pub fn is_windowed(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.is_none_or(|s| at >= s) && self.end.is_none_or(|e| at <= e)
    }
}

/// 1-based page over pickup points ordered by registration date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    page: u32,
    limit: u32,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 30;

    pub fn new(page: Option<u32>, limit: Option<u32>) -> DomainResult<Self> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(Self::DEFAULT_LIMIT);
        if page == 0 {
            return Err(DomainError::validation("page must be at least 1"));
        }
        if limit == 0 || limit > Self::MAX_LIMIT {
            return Err(DomainError::validation(format!(
                "limit must be between 1 and {}",
                Self::MAX_LIMIT
            )));
        }
        Ok(Self { page, limit })
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceptionWithProducts {
    pub reception: Reception,
    /// Ordered oldest first.
    pub products: Vec<Product>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PickupPointSummary {
    pub pickup_point: PickupPoint,
    /// Ordered by opening time.
    pub receptions: Vec<ReceptionWithProducts>,
}

#[async_trait]
pub trait PickupPointRegistry: Send + Sync {
    async fn create_pickup_point(&self, city: City) -> RegistryResult<PickupPoint>;

    async fn find_pickup_point(&self, id: PickupPointId) -> RegistryResult<Option<PickupPoint>>;

    /// List pickup points with their receptions and products.
    ///
    /// With a windowed filter only pickup points having at least one reception
    /// in the window are listed, and only those receptions are included.
    async fn list_pickup_points(
        &self,
        filter: ListFilter,
        page: Page,
    ) -> RegistryResult<Vec<PickupPointSummary>>;
}
