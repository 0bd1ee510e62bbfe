//! Infrastructure layer: configuration, Postgres plumbing, and the stores
//! behind the reception ledger and the pickup point registry.

pub mod config;
pub mod db;
pub mod in_memory;
pub mod ledger;
pub mod registry;

mod rows;

pub use config::{AppConfig, ConfigError};
pub use in_memory::InMemoryStore;
pub use ledger::{LedgerError, LedgerResult, PostgresReceptionLedger, ReceptionLedger};
pub use registry::{
    ListFilter, Page, PickupPointRegistry, PickupPointSummary, PostgresPickupPointRegistry,
    ReceptionWithProducts, RegistryError, RegistryResult,
};
