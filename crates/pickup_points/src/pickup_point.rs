use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pvz_core::{Entity, PickupPointId};

use crate::City;

/// A registered pickup point.
///
/// Never mutated after registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupPoint {
    pub id: PickupPointId,
    pub registration_date: DateTime<Utc>,
    pub city: City,
}

impl PickupPoint {
    /// Register a new pickup point at `now` with a freshly generated id.
    pub fn register(city: City, now: DateTime<Utc>) -> Self {
        Self {
            id: PickupPointId::new(),
            registration_date: now,
            city,
        }
    }
}

impl Entity for PickupPoint {
    type Id = PickupPointId;

    fn id(&self) -> PickupPointId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_stamps_id_and_date() {
        let now = Utc::now();
        let a = PickupPoint::register(City::Moscow, now);
        let b = PickupPoint::register(City::Moscow, now);

        assert_eq!(a.registration_date, now);
        assert_eq!(a.city, City::Moscow);
        assert_ne!(a.id(), b.id());
    }
}
