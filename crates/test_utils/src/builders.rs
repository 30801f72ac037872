//! Test Data Builders
//!
//! Builders construct test data with sensible defaults, so a test only
//! names the fields it cares about.

use chrono::NaiveDate;
use std::sync::atomic::{AtomicU64, Ordering};

use core_kernel::{BuildingId, Money, ResidentId};
use domain_banking::{BankTransaction, ProviderTransaction};
use domain_building::{Apartment, Building, BuildingStatus, MockBuildingPort};

use crate::fixtures::{MoneyFixtures, PeriodFixtures, PermillageFixtures};

static NEXT_EXTERNAL_ID: AtomicU64 = AtomicU64::new(1);

/// Unique provider transaction id for the current test binary
pub fn next_external_id() -> String {
    format!("tx-{}", NEXT_EXTERNAL_ID.fetch_add(1, Ordering::Relaxed))
}

/// A building together with its apartments
#[derive(Debug, Clone)]
pub struct TestBuilding {
    pub building: Building,
    pub apartments: Vec<Apartment>,
}

impl TestBuilding {
    pub fn id(&self) -> BuildingId {
        self.building.id
    }

    /// Apartment by unit label; panics when absent
    pub fn unit(&self, unit: &str) -> &Apartment {
        self.apartments
            .iter()
            .find(|a| a.unit == unit)
            .unwrap_or_else(|| panic!("no apartment {}", unit))
    }

    /// Stores the building and its apartments in a mock port
    pub async fn seed_into(&self, port: &MockBuildingPort) {
        port.seed(self.building.clone(), self.apartments.clone()).await;
    }
}

/// Builder for a building and its apartments
pub struct BuildingBuilder {
    name: String,
    address: Option<String>,
    monthly_quota: Money,
    status: BuildingStatus,
    units: Vec<(String, u32, Option<ResidentId>)>,
}

impl Default for BuildingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildingBuilder {
    /// An active building with units 1A (600) and 1B (400) and a 50.00 EUR quota
    pub fn new() -> Self {
        Self {
            name: "Edificio Sol".to_string(),
            address: Some("Rua das Flores 12, Lisboa".to_string()),
            monthly_quota: MoneyFixtures::monthly_quota(),
            status: BuildingStatus::Active,
            units: PermillageFixtures::two_units()
                .into_iter()
                .map(|(unit, permillage)| (unit.to_string(), permillage, None))
                .collect(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_quota(mut self, quota: Money) -> Self {
        self.monthly_quota = quota;
        self
    }

    pub fn with_status(mut self, status: BuildingStatus) -> Self {
        self.status = status;
        self
    }

    /// Replaces the default units
    pub fn with_units(mut self, units: &[(&str, u32)]) -> Self {
        self.units = units
            .iter()
            .map(|(unit, permillage)| (unit.to_string(), *permillage, None))
            .collect();
        self
    }

    /// Assigns a resident to an existing unit
    pub fn with_resident(mut self, unit: &str, resident_id: ResidentId) -> Self {
        for entry in self.units.iter_mut().filter(|(u, _, _)| u == unit) {
            entry.2 = Some(resident_id);
        }
        self
    }

    pub fn build(self) -> TestBuilding {
        let mut building = Building::new(self.name, self.monthly_quota);
        building.address = self.address;
        building.status = self.status;
        let apartments = self
            .units
            .into_iter()
            .map(|(unit, permillage, resident)| {
                let apartment = Apartment::new(building.id, unit, PermillageFixtures::of(permillage));
                match resident {
                    Some(resident_id) => apartment.with_resident(resident_id),
                    None => apartment,
                }
            })
            .collect();
        TestBuilding {
            building,
            apartments,
        }
    }
}

/// Builder for bank transactions, either as the provider reports them or as stored
pub struct BankTransactionBuilder {
    external_id: String,
    amount: Money,
    counterpart_iban: Option<String>,
    counterpart_name: Option<String>,
    booking_date: NaiveDate,
    description: Option<String>,
}

impl Default for BankTransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BankTransactionBuilder {
    /// A 50.00 EUR credit booked on 2024-03-05, with a fresh external id
    pub fn new() -> Self {
        Self {
            external_id: next_external_id(),
            amount: MoneyFixtures::monthly_quota(),
            counterpart_iban: None,
            counterpart_name: None,
            booking_date: PeriodFixtures::booking_date(2024, 3, 5),
            description: None,
        }
    }

    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_id = id.into();
        self
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_cents(self, cents: i64) -> Self {
        self.with_amount(MoneyFixtures::eur(cents))
    }

    pub fn from_iban(mut self, iban: impl Into<String>) -> Self {
        self.counterpart_iban = Some(iban.into());
        self
    }

    pub fn with_counterpart_name(mut self, name: impl Into<String>) -> Self {
        self.counterpart_name = Some(name.into());
        self
    }

    pub fn booked_on(mut self, year: i32, month: u32, day: u32) -> Self {
        self.booking_date = PeriodFixtures::booking_date(year, month, day);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The transaction as the bank data provider reports it
    pub fn provider(self) -> ProviderTransaction {
        ProviderTransaction {
            id: self.external_id,
            amount_cents: self.amount.minor(),
            currency: self.amount.currency().code().to_string(),
            counterpart_iban: self.counterpart_iban,
            counterpart_name: self.counterpart_name,
            booking_date: self.booking_date,
            description: self.description,
        }
    }

    /// The transaction as imported for `building_id`, still unmatched
    pub fn stored(self, building_id: BuildingId, account_id: &str) -> BankTransaction {
        let mut transaction = BankTransaction::new(
            building_id,
            self.external_id,
            account_id,
            self.amount,
            self.booking_date,
        );
        transaction.counterpart_iban = self.counterpart_iban;
        transaction.counterpart_name = self.counterpart_name;
        transaction.description = self.description;
        transaction
    }
}
