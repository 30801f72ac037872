//! Buildings and apartments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{ApartmentId, BuildingId, Money, Permillage, ResidentId};

/// Lifecycle status of a building
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingStatus {
    /// Apartments are being configured; permillage may not total 1000 yet
    Setup,
    /// Operational; permillage totals 1000
    Active,
    /// Read-only
    Archived,
}

impl BuildingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildingStatus::Setup => "setup",
            BuildingStatus::Active => "active",
            BuildingStatus::Archived => "archived",
        }
    }

    /// Whether a building may move from `self` to `target`
    pub fn can_transition_to(&self, target: BuildingStatus) -> bool {
        matches!(
            (self, target),
            (BuildingStatus::Setup, BuildingStatus::Active)
                | (BuildingStatus::Active, BuildingStatus::Archived)
        )
    }
}

impl fmt::Display for BuildingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "setup" => Ok(BuildingStatus::Setup),
            "active" => Ok(BuildingStatus::Active),
            "archived" => Ok(BuildingStatus::Archived),
            other => Err(format!("unknown building status: {}", other)),
        }
    }
}

/// A condominium building
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub id: BuildingId,
    pub name: String,
    pub address: Option<String>,
    /// Recurring quota owed by each apartment every month
    pub monthly_quota: Money,
    pub status: BuildingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Building {
    /// Creates a building in `setup`
    pub fn new(name: impl Into<String>, monthly_quota: Money) -> Self {
        let now = Utc::now();
        Self {
            id: BuildingId::new_v7(),
            name: name.into(),
            address: None,
            monthly_quota,
            status: BuildingStatus::Setup,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_archived(&self) -> bool {
        self.status == BuildingStatus::Archived
    }
}

/// A unit within a building
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Apartment {
    pub id: ApartmentId,
    pub building_id: BuildingId,
    /// Unit label, e.g. "3B"
    pub unit: String,
    pub permillage: Permillage,
    pub resident_id: Option<ResidentId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Apartment {
    pub fn new(building_id: BuildingId, unit: impl Into<String>, permillage: Permillage) -> Self {
        let now = Utc::now();
        Self {
            id: ApartmentId::new_v7(),
            building_id,
            unit: unit.into(),
            permillage,
            resident_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_resident(mut self, resident_id: ResidentId) -> Self {
        self.resident_id = Some(resident_id);
        self
    }
}

/// Sum of permillage across apartments
pub fn permillage_total<'a>(apartments: impl IntoIterator<Item = &'a Apartment>) -> u32 {
    apartments.into_iter().map(|a| a.permillage.value()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;

    #[test]
    fn test_status_transitions() {
        assert!(BuildingStatus::Setup.can_transition_to(BuildingStatus::Active));
        assert!(BuildingStatus::Active.can_transition_to(BuildingStatus::Archived));
        assert!(!BuildingStatus::Archived.can_transition_to(BuildingStatus::Active));
        assert!(!BuildingStatus::Setup.can_transition_to(BuildingStatus::Archived));
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [BuildingStatus::Setup, BuildingStatus::Active, BuildingStatus::Archived] {
            assert_eq!(status.as_str().parse::<BuildingStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_permillage_total() {
        let building = Building::new("Rua Augusta 12", Money::from_minor(5000, Currency::EUR));
        let apartments = vec![
            Apartment::new(building.id, "1A", Permillage::new(600).unwrap()),
            Apartment::new(building.id, "1B", Permillage::new(400).unwrap()),
        ];
        assert_eq!(permillage_total(&apartments), 1000);
    }
}
