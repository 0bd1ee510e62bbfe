use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pvz_core::{DomainError, Entity, PickupPointId, ReceptionId};

/// Reception lifecycle state.
///
/// Canonical tokens are `in_progress` / `close`, used both on the wire and in
/// the `receptions.status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReceptionStatus {
    #[serde(rename = "in_progress")]
    InProgress,
    #[serde(rename = "close")]
    Closed,
}

impl ReceptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceptionStatus::InProgress => "in_progress",
            ReceptionStatus::Closed => "close",
        }
    }
}

impl core::fmt::Display for ReceptionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReceptionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(ReceptionStatus::InProgress),
            "close" => Ok(ReceptionStatus::Closed),
            other => Err(DomainError::validation(format!(
                "unknown reception status '{other}'"
            ))),
        }
    }
}

/// An intake session at a pickup point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reception {
    pub id: ReceptionId,
    /// When the reception was opened.
    pub date_time: DateTime<Utc>,
    pub pickup_point_id: PickupPointId,
    pub status: ReceptionStatus,
    /// Set exactly once, by the close transition.
    pub closed_at: Option<DateTime<Utc>>,
}

impl Reception {
    pub fn open(pickup_point_id: PickupPointId, now: DateTime<Utc>) -> Self {
        Self {
            id: ReceptionId::new(),
            date_time: now,
            pickup_point_id,
            status: ReceptionStatus::InProgress,
            closed_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == ReceptionStatus::InProgress
    }
}

impl Entity for Reception {
    type Id = ReceptionId;

    fn id(&self) -> ReceptionId {
        self.id
    }
}
