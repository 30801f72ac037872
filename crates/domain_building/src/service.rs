//! Building lifecycle and resident IBAN management

use std::sync::Arc;
use tracing::{info, instrument};

use core_kernel::{ApartmentId, BuildingId, Money, Permillage, ResidentIbanId, ResidentId};

use crate::building::{permillage_total, Apartment, Building, BuildingStatus};
use crate::error::BuildingError;
use crate::iban::{Iban, ResidentIban};
use crate::ports::BuildingPort;

/// Input for adding an apartment
#[derive(Debug, Clone)]
pub struct NewApartment {
    pub unit: String,
    pub permillage: u32,
    pub resident_id: Option<ResidentId>,
}

/// Partial update of an apartment
#[derive(Debug, Clone, Default)]
pub struct ApartmentPatch {
    pub unit: Option<String>,
    pub permillage: Option<u32>,
    /// `Some(None)` clears the resident
    pub resident_id: Option<Option<ResidentId>>,
}

/// Application service for buildings, apartments and resident IBANs
pub struct BuildingService {
    port: Arc<dyn BuildingPort>,
}

impl BuildingService {
    pub fn new(port: Arc<dyn BuildingPort>) -> Self {
        Self { port }
    }

    /// Creates a building in `setup`
    #[instrument(skip(self))]
    pub async fn create_building(
        &self,
        name: &str,
        address: Option<String>,
        monthly_quota: Money,
    ) -> Result<Building, BuildingError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BuildingError::validation("name", "must not be empty"));
        }
        if monthly_quota.is_negative() {
            return Err(BuildingError::validation("monthly_quota", "must not be negative"));
        }
        let mut building = Building::new(name, monthly_quota);
        building.address = address;
        let building = self.port.create_building(building).await?;
        info!(building_id = %building.id, "building created");
        Ok(building)
    }

    pub async fn get_building(&self, id: BuildingId) -> Result<Building, BuildingError> {
        Ok(self.port.get_building(id).await?)
    }

    pub async fn list_apartments(&self, building_id: BuildingId) -> Result<Vec<Apartment>, BuildingError> {
        Ok(self.port.list_apartments(building_id).await?)
    }

    #[instrument(skip(self, input))]
    pub async fn add_apartment(
        &self,
        building_id: BuildingId,
        input: NewApartment,
    ) -> Result<Apartment, BuildingError> {
        self.writable_building(building_id).await?;
        let unit = validate_unit(&input.unit)?;
        let permillage = validate_permillage(input.permillage)?;
        let mut apartment = Apartment::new(building_id, unit, permillage);
        apartment.resident_id = input.resident_id;
        Ok(self.port.save_apartment(apartment).await?)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_apartment(
        &self,
        apartment_id: ApartmentId,
        patch: ApartmentPatch,
    ) -> Result<Apartment, BuildingError> {
        let mut apartment = self.port.get_apartment(apartment_id).await?;
        self.writable_building(apartment.building_id).await?;
        if let Some(unit) = patch.unit {
            apartment.unit = validate_unit(&unit)?;
        }
        if let Some(value) = patch.permillage {
            apartment.permillage = validate_permillage(value)?;
        }
        if let Some(resident_id) = patch.resident_id {
            apartment.resident_id = resident_id;
        }
        Ok(self.port.save_apartment(apartment).await?)
    }

    #[instrument(skip(self))]
    pub async fn remove_apartment(&self, apartment_id: ApartmentId) -> Result<(), BuildingError> {
        let apartment = self.port.get_apartment(apartment_id).await?;
        self.writable_building(apartment.building_id).await?;
        Ok(self.port.remove_apartment(apartment_id).await?)
    }

    /// Moves a building out of `setup`
    ///
    /// The apartments' permillage must total exactly 1000.
    #[instrument(skip(self))]
    pub async fn activate_building(&self, building_id: BuildingId) -> Result<Building, BuildingError> {
        let building = self.port.get_building(building_id).await?;
        ensure_transition(building.status, BuildingStatus::Active)?;

        let apartments = self.port.list_apartments(building_id).await?;
        let total = permillage_total(&apartments);
        if total != Permillage::WHOLE {
            return Err(BuildingError::PermillageMismatch { actual: total });
        }

        let building = self
            .port
            .transition_building(building_id, BuildingStatus::Setup, BuildingStatus::Active)
            .await?;
        info!(building_id = %building_id, apartments = apartments.len(), "building activated");
        Ok(building)
    }

    #[instrument(skip(self))]
    pub async fn archive_building(&self, building_id: BuildingId) -> Result<Building, BuildingError> {
        let building = self.port.get_building(building_id).await?;
        ensure_transition(building.status, BuildingStatus::Archived)?;
        let building = self
            .port
            .transition_building(building_id, BuildingStatus::Active, BuildingStatus::Archived)
            .await?;
        info!(building_id = %building_id, "building archived");
        Ok(building)
    }

    /// Registers an IBAN for an apartment after normalizing and validating it
    #[instrument(skip(self, raw_iban))]
    pub async fn add_resident_iban(
        &self,
        apartment_id: ApartmentId,
        label: &str,
        raw_iban: &str,
        is_primary: bool,
    ) -> Result<ResidentIban, BuildingError> {
        let label = label.trim();
        if label.is_empty() {
            return Err(BuildingError::validation("label", "must not be empty"));
        }
        let iban = Iban::parse(raw_iban)?;
        let apartment = self.port.get_apartment(apartment_id).await?;
        self.writable_building(apartment.building_id).await?;
        let saved = self
            .port
            .add_resident_iban(ResidentIban::new(apartment_id, label, iban, is_primary))
            .await?;
        info!(apartment_id = %apartment_id, primary = saved.is_primary, "resident IBAN registered");
        Ok(saved)
    }

    pub async fn remove_resident_iban(&self, id: ResidentIbanId) -> Result<(), BuildingError> {
        Ok(self.port.remove_resident_iban(id).await?)
    }

    pub async fn list_resident_ibans(&self, building_id: BuildingId) -> Result<Vec<ResidentIban>, BuildingError> {
        Ok(self.port.list_resident_ibans(building_id).await?)
    }

    async fn writable_building(&self, building_id: BuildingId) -> Result<Building, BuildingError> {
        let building = self.port.get_building(building_id).await?;
        if building.is_archived() {
            return Err(BuildingError::Archived);
        }
        Ok(building)
    }
}

fn ensure_transition(from: BuildingStatus, to: BuildingStatus) -> Result<(), BuildingError> {
    if from == BuildingStatus::Archived {
        return Err(BuildingError::Archived);
    }
    if !from.can_transition_to(to) {
        return Err(BuildingError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    Ok(())
}

fn validate_unit(unit: &str) -> Result<String, BuildingError> {
    let unit = unit.trim();
    if unit.is_empty() {
        return Err(BuildingError::validation("unit", "must not be empty"));
    }
    Ok(unit.to_string())
}

fn validate_permillage(value: u32) -> Result<Permillage, BuildingError> {
    Permillage::new(value).map_err(|e| BuildingError::validation("permillage", e.to_string()))
}
