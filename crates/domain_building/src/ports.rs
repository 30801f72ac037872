//! Building Domain Ports
//!
//! `BuildingPort` is the storage contract for buildings, apartments and
//! resident IBANs. Implementations must enforce the permillage invariant
//! inside the same write that changes an apartment: on an active building
//! the total stays exactly 1000, and activation itself checks the total.
//!
//! Adapters:
//!
//! - **Postgres**: `infra_db::PgBuildingRepository`
//! - **Mock**: [`mock::MockBuildingPort`], in memory, for tests

use async_trait::async_trait;

use core_kernel::{
    ApartmentId, BuildingId, DomainPort, HealthCheckable, PortError, ResidentIbanId, ResidentId,
};

use crate::building::{Apartment, Building, BuildingStatus};
use crate::iban::ResidentIban;

/// Storage port for the building domain
#[async_trait]
pub trait BuildingPort: DomainPort + HealthCheckable {
    /// Inserts a new building
    async fn create_building(&self, building: Building) -> Result<Building, PortError>;

    /// Retrieves a building by ID
    async fn get_building(&self, id: BuildingId) -> Result<Building, PortError>;

    /// Moves a building from `from` to `to`
    ///
    /// Fails with `Conflict` if the current status is not `from`. When `to` is
    /// `Active` the permillage total is checked in the same write and a
    /// mismatch fails with `Validation` on field `permillage`.
    async fn transition_building(
        &self,
        id: BuildingId,
        from: BuildingStatus,
        to: BuildingStatus,
    ) -> Result<Building, PortError>;

    /// Lists the apartments of a building, ordered by unit
    async fn list_apartments(&self, building_id: BuildingId) -> Result<Vec<Apartment>, PortError>;

    /// Retrieves an apartment by ID
    async fn get_apartment(&self, id: ApartmentId) -> Result<Apartment, PortError>;

    /// Lists the apartments a resident lives in
    async fn apartments_for_resident(&self, resident_id: ResidentId) -> Result<Vec<Apartment>, PortError>;

    /// Inserts or replaces an apartment
    ///
    /// Rejected with `Conflict` on archived buildings or a duplicate unit, and
    /// with `Validation` when it would move an active building off 1000.
    async fn save_apartment(&self, apartment: Apartment) -> Result<Apartment, PortError>;

    /// Deletes an apartment, under the same rules as [`BuildingPort::save_apartment`]
    async fn remove_apartment(&self, id: ApartmentId) -> Result<(), PortError>;

    /// Lists every resident IBAN registered in a building
    async fn list_resident_ibans(&self, building_id: BuildingId) -> Result<Vec<ResidentIban>, PortError>;

    /// Registers an IBAN for an apartment
    ///
    /// The first IBAN of an apartment becomes primary. Adding a primary IBAN
    /// clears the previous primary. A duplicate IBAN on the same apartment
    /// fails with `Conflict`.
    async fn add_resident_iban(&self, iban: ResidentIban) -> Result<ResidentIban, PortError>;

    /// Removes a registered IBAN
    async fn remove_resident_iban(&self, id: ResidentIbanId) -> Result<(), PortError>;
}

/// Mock implementation of BuildingPort for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use chrono::Utc;
    use core_kernel::{HealthCheckResult, Permillage};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    #[derive(Debug, Default)]
    struct Store {
        buildings: HashMap<BuildingId, Building>,
        apartments: HashMap<ApartmentId, Apartment>,
        ibans: HashMap<ResidentIbanId, ResidentIban>,
    }

    impl Store {
        fn building(&self, id: BuildingId) -> Result<&Building, PortError> {
            self.buildings
                .get(&id)
                .ok_or_else(|| PortError::not_found("Building", id))
        }

        fn total_without(&self, building_id: BuildingId, skip: ApartmentId) -> u32 {
            self.apartments
                .values()
                .filter(|a| a.building_id == building_id && a.id != skip)
                .map(|a| a.permillage.value())
                .sum()
        }

        fn check_writable(&self, building_id: BuildingId, new_total: u32) -> Result<(), PortError> {
            let building = self.building(building_id)?;
            match building.status {
                BuildingStatus::Archived => Err(PortError::conflict("building is archived")),
                BuildingStatus::Active if new_total != Permillage::WHOLE => {
                    Err(PortError::validation_field(
                        format!("permillage would total {}, expected {}", new_total, Permillage::WHOLE),
                        "permillage",
                    ))
                }
                _ => Ok(()),
            }
        }
    }

    /// In-memory mock implementation of BuildingPort
    #[derive(Debug, Default, Clone)]
    pub struct MockBuildingPort {
        store: Arc<RwLock<Store>>,
    }

    impl MockBuildingPort {
        /// Creates a new mock port
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates a building and its apartments, bypassing invariant checks
        pub async fn with_building(building: Building, apartments: Vec<Apartment>) -> Self {
            let port = Self::new();
            port.seed(building, apartments).await;
            port
        }

        /// Adds a building and apartments, bypassing invariant checks
        pub async fn seed(&self, building: Building, apartments: Vec<Apartment>) {
            let mut store = self.store.write().await;
            for apartment in apartments {
                store.apartments.insert(apartment.id, apartment);
            }
            store.buildings.insert(building.id, building);
        }
    }

    impl DomainPort for MockBuildingPort {}

    #[async_trait]
    impl HealthCheckable for MockBuildingPort {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "mock-building-port".to_string(),
                status: core_kernel::AdapterHealth::Healthy,
                latency_ms: 0,
                message: Some("Mock adapter always healthy".to_string()),
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl BuildingPort for MockBuildingPort {
        async fn create_building(&self, building: Building) -> Result<Building, PortError> {
            let mut store = self.store.write().await;
            if store.buildings.contains_key(&building.id) {
                return Err(PortError::conflict(format!("building {} exists", building.id)));
            }
            store.buildings.insert(building.id, building.clone());
            Ok(building)
        }

        async fn get_building(&self, id: BuildingId) -> Result<Building, PortError> {
            self.store.read().await.building(id).cloned()
        }

        async fn transition_building(
            &self,
            id: BuildingId,
            from: BuildingStatus,
            to: BuildingStatus,
        ) -> Result<Building, PortError> {
            let mut store = self.store.write().await;
            let current = store.building(id)?.status;
            if current != from {
                return Err(PortError::conflict(format!(
                    "building is {}, expected {}",
                    current, from
                )));
            }
            if to == BuildingStatus::Active {
                let total: u32 = store
                    .apartments
                    .values()
                    .filter(|a| a.building_id == id)
                    .map(|a| a.permillage.value())
                    .sum();
                if total != Permillage::WHOLE {
                    return Err(PortError::validation_field(
                        format!("permillage totals {}, expected {}", total, Permillage::WHOLE),
                        "permillage",
                    ));
                }
            }
            let building = store
                .buildings
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("Building", id))?;
            building.status = to;
            building.updated_at = Utc::now();
            Ok(building.clone())
        }

        async fn list_apartments(&self, building_id: BuildingId) -> Result<Vec<Apartment>, PortError> {
            let store = self.store.read().await;
            store.building(building_id)?;
            let mut apartments: Vec<Apartment> = store
                .apartments
                .values()
                .filter(|a| a.building_id == building_id)
                .cloned()
                .collect();
            apartments.sort_by(|a, b| a.unit.cmp(&b.unit));
            Ok(apartments)
        }

        async fn get_apartment(&self, id: ApartmentId) -> Result<Apartment, PortError> {
            self.store
                .read()
                .await
                .apartments
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Apartment", id))
        }

        async fn apartments_for_resident(&self, resident_id: ResidentId) -> Result<Vec<Apartment>, PortError> {
            let store = self.store.read().await;
            let mut apartments: Vec<Apartment> = store
                .apartments
                .values()
                .filter(|a| a.resident_id == Some(resident_id))
                .cloned()
                .collect();
            apartments.sort_by(|a, b| a.unit.cmp(&b.unit));
            Ok(apartments)
        }

        async fn save_apartment(&self, apartment: Apartment) -> Result<Apartment, PortError> {
            let mut store = self.store.write().await;
            let new_total = store.total_without(apartment.building_id, apartment.id)
                + apartment.permillage.value();
            store.check_writable(apartment.building_id, new_total)?;
            let duplicate_unit = store.apartments.values().any(|a| {
                a.building_id == apartment.building_id && a.id != apartment.id && a.unit == apartment.unit
            });
            if duplicate_unit {
                return Err(PortError::conflict(format!("unit {} already exists", apartment.unit)));
            }
            let mut saved = apartment;
            saved.updated_at = Utc::now();
            store.apartments.insert(saved.id, saved.clone());
            Ok(saved)
        }

        async fn remove_apartment(&self, id: ApartmentId) -> Result<(), PortError> {
            let mut store = self.store.write().await;
            let building_id = store
                .apartments
                .get(&id)
                .map(|a| a.building_id)
                .ok_or_else(|| PortError::not_found("Apartment", id))?;
            let new_total = store.total_without(building_id, id);
            store.check_writable(building_id, new_total)?;
            store.apartments.remove(&id);
            store.ibans.retain(|_, iban| iban.apartment_id != id);
            Ok(())
        }

        async fn list_resident_ibans(&self, building_id: BuildingId) -> Result<Vec<ResidentIban>, PortError> {
            let store = self.store.read().await;
            let mut ibans: Vec<ResidentIban> = store
                .ibans
                .values()
                .filter(|iban| {
                    store
                        .apartments
                        .get(&iban.apartment_id)
                        .map(|a| a.building_id == building_id)
                        .unwrap_or(false)
                })
                .cloned()
                .collect();
            ibans.sort_by_key(|iban| iban.created_at);
            Ok(ibans)
        }

        async fn add_resident_iban(&self, iban: ResidentIban) -> Result<ResidentIban, PortError> {
            let mut store = self.store.write().await;
            if !store.apartments.contains_key(&iban.apartment_id) {
                return Err(PortError::not_found("Apartment", iban.apartment_id));
            }
            let existing: Vec<&ResidentIban> = store
                .ibans
                .values()
                .filter(|other| other.apartment_id == iban.apartment_id)
                .collect();
            if existing.iter().any(|other| other.iban == iban.iban) {
                return Err(PortError::conflict(format!(
                    "IBAN {} already registered for apartment",
                    iban.iban
                )));
            }
            let mut saved = iban;
            saved.is_primary = saved.is_primary || existing.is_empty();
            if saved.is_primary {
                for other in store.ibans.values_mut() {
                    if other.apartment_id == saved.apartment_id {
                        other.is_primary = false;
                    }
                }
            }
            store.ibans.insert(saved.id, saved.clone());
            Ok(saved)
        }

        async fn remove_resident_iban(&self, id: ResidentIbanId) -> Result<(), PortError> {
            self.store
                .write()
                .await
                .ibans
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| PortError::not_found("ResidentIban", id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockBuildingPort;
    use super::*;
    use crate::iban::Iban;
    use core_kernel::{Currency, Money, Permillage};

    fn building() -> Building {
        Building::new("Edificio Sol", Money::from_minor(5000, Currency::EUR))
    }

    #[tokio::test]
    async fn test_activation_checks_permillage_total() {
        let b = building();
        let port = MockBuildingPort::with_building(
            b.clone(),
            vec![Apartment::new(b.id, "1A", Permillage::new(600).unwrap())],
        )
        .await;

        let err = port
            .transition_building(b.id, BuildingStatus::Setup, BuildingStatus::Active)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Validation { .. }));

        port.save_apartment(Apartment::new(b.id, "1B", Permillage::new(400).unwrap()))
            .await
            .unwrap();
        let active = port
            .transition_building(b.id, BuildingStatus::Setup, BuildingStatus::Active)
            .await
            .unwrap();
        assert_eq!(active.status, BuildingStatus::Active);
    }

    #[tokio::test]
    async fn test_active_building_rejects_breaking_edit() {
        let mut b = building();
        b.status = BuildingStatus::Active;
        let a = Apartment::new(b.id, "1A", Permillage::new(1000).unwrap());
        let port = MockBuildingPort::with_building(b.clone(), vec![a.clone()]).await;

        let mut edited = a.clone();
        edited.permillage = Permillage::new(900).unwrap();
        assert!(port.save_apartment(edited).await.is_err());
        assert!(port.remove_apartment(a.id).await.is_err());

        // relabelling keeps the total
        let mut relabelled = a.clone();
        relabelled.unit = "R/C".to_string();
        assert!(port.save_apartment(relabelled).await.is_ok());
    }

    #[tokio::test]
    async fn test_transition_requires_expected_status() {
        let b = building();
        let port = MockBuildingPort::with_building(b.clone(), vec![]).await;
        let err = port
            .transition_building(b.id, BuildingStatus::Active, BuildingStatus::Archived)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_new_primary_iban_clears_previous() {
        let b = building();
        let a = Apartment::new(b.id, "1A", Permillage::new(1000).unwrap());
        let port = MockBuildingPort::with_building(b.clone(), vec![a.clone()]).await;

        let first = port
            .add_resident_iban(ResidentIban::new(
                a.id,
                "Joint account",
                Iban::parse("DE89370400440532013000").unwrap(),
                false,
            ))
            .await
            .unwrap();
        assert!(first.is_primary);

        port.add_resident_iban(ResidentIban::new(
            a.id,
            "Salary account",
            Iban::parse("NL91ABNA0417164300").unwrap(),
            true,
        ))
        .await
        .unwrap();

        let ibans = port.list_resident_ibans(b.id).await.unwrap();
        assert_eq!(ibans.len(), 2);
        assert_eq!(ibans.iter().filter(|i| i.is_primary).count(), 1);
        assert!(ibans.iter().any(|i| i.is_primary && i.label == "Salary account"));
    }

    #[tokio::test]
    async fn test_duplicate_iban_conflicts() {
        let b = building();
        let a = Apartment::new(b.id, "1A", Permillage::new(1000).unwrap());
        let port = MockBuildingPort::with_building(b.clone(), vec![a.clone()]).await;
        let iban = Iban::parse("DE89370400440532013000").unwrap();

        port.add_resident_iban(ResidentIban::new(a.id, "Main", iban.clone(), true))
            .await
            .unwrap();
        let err = port
            .add_resident_iban(ResidentIban::new(a.id, "Again", iban, false))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }
}
