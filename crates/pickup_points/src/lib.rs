//! Pickup point (PVZ) domain module.
//!
//! Pure data and validation; persistence lives in `pvz-infra`.

pub mod city;
pub mod pickup_point;

pub use city::City;
pub use pickup_point::PickupPoint;
