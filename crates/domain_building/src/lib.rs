//! Building Domain
//!
//! Buildings, their apartments and the ownership weights (permillage) that
//! every cost split in the system is based on, plus the resident IBANs used
//! as matching keys during bank reconciliation.
//!
//! # Lifecycle
//!
//! A building starts in `setup`, where apartments may be freely added and
//! re-weighted. Activation requires the apartments' permillage to total
//! exactly 1000; from then on the store rejects any apartment change that
//! would break that total. Archived buildings accept no further writes.

pub mod building;
pub mod iban;
pub mod error;
pub mod ports;
pub mod service;

pub use building::{permillage_total, Apartment, Building, BuildingStatus};
pub use iban::{Iban, ResidentIban};
pub use error::BuildingError;
pub use ports::BuildingPort;
#[cfg(any(test, feature = "mock"))]
pub use ports::mock::MockBuildingPort;
pub use service::{ApartmentPatch, BuildingService, NewApartment};
