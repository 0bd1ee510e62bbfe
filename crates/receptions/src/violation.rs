use thiserror::Error;

use pvz_core::PickupPointId;

/// Expected business outcomes of ledger operations.
///
/// These are not failures of the system: callers map them to client errors
/// and must not retry them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerViolation {
    #[error("pickup point {pickup_point_id} does not exist")]
    PickupPointNotFound { pickup_point_id: PickupPointId },

    #[error("pickup point {pickup_point_id} already has a reception in progress")]
    ReceptionAlreadyOpen { pickup_point_id: PickupPointId },

    #[error("pickup point {pickup_point_id} has no reception to close")]
    NoOpenReception { pickup_point_id: PickupPointId },

    #[error("pickup point {pickup_point_id} has no reception in progress")]
    NoActiveReception { pickup_point_id: PickupPointId },

    #[error("reception at pickup point {pickup_point_id} has no products to delete")]
    NoProductToDelete { pickup_point_id: PickupPointId },
}

impl LedgerViolation {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerViolation::PickupPointNotFound { .. } => "pickup_point_not_found",
            LedgerViolation::ReceptionAlreadyOpen { .. } => "reception_already_open",
            LedgerViolation::NoOpenReception { .. } => "no_open_reception",
            LedgerViolation::NoActiveReception { .. } => "no_active_reception",
            LedgerViolation::NoProductToDelete { .. } => "no_product_to_delete",
        }
    }

    pub fn pickup_point_id(&self) -> PickupPointId {
        match self {
            LedgerViolation::PickupPointNotFound { pickup_point_id }
            | LedgerViolation::ReceptionAlreadyOpen { pickup_point_id }
            | LedgerViolation::NoOpenReception { pickup_point_id }
            | LedgerViolation::NoActiveReception { pickup_point_id }
            | LedgerViolation::NoProductToDelete { pickup_point_id } => *pickup_point_id,
        }
    }
}
