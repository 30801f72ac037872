//! Dashboard aggregation over the ledger
//!
//! Read-only projections. A month with no ledger row counts as `pending`
//! with amount zero.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::instrument;

use core_kernel::{
    ApartmentId, BillingPeriod, BuildingId, DomainPort, Money, Permillage, PortError,
};
use domain_building::BuildingPort;

use crate::error::LedgerError;
use crate::ports::PaymentLedgerPort;
use crate::status::PaymentStatus;

/// Expected and paid amounts of one installment row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallmentAmounts {
    pub apartment_id: ApartmentId,
    pub due: BillingPeriod,
    pub status: PaymentStatus,
    pub expected: Money,
    pub paid: Money,
}

/// Read port onto extraordinary-project installments
///
/// Implemented by the projects domain so reporting can fold installments into
/// building totals without depending on it.
#[async_trait]
pub trait ExtraordinaryLedger: DomainPort {
    /// Installments of the building's live projects that fall due in `year`
    async fn installments_due(
        &self,
        building_id: BuildingId,
        year: i32,
    ) -> Result<Vec<InstallmentAmounts>, PortError>;
}

/// Status and amount recorded for a month
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthEntry {
    pub status: PaymentStatus,
    pub amount: Money,
}

/// One apartment's line of the payment map
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApartmentPaymentRow {
    pub apartment_id: ApartmentId,
    pub unit: String,
    pub permillage: Permillage,
    /// Only months that have a ledger row
    pub months: BTreeMap<u32, MonthEntry>,
    /// Sum over `paid` and `partial` months
    pub total_paid: Money,
    /// Twelve quotas minus `total_paid`; negative when overpaid
    pub balance: Money,
}

/// Year grid of recurring payments for a building
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentMap {
    pub building_id: BuildingId,
    pub year: i32,
    pub monthly_quota: Money,
    pub apartments: Vec<ApartmentPaymentRow>,
}

/// Dashboard figures for a building
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildingStats {
    pub year: i32,
    pub month: u32,
    pub total_collected: Money,
    pub total_overdue: Money,
    /// Apartments whose quota for `month` is paid
    pub paid_count: usize,
    /// Number of apartments
    pub total: usize,
}

pub struct ReportingService {
    buildings: Arc<dyn BuildingPort>,
    ledger: Arc<dyn PaymentLedgerPort>,
    extraordinary: Arc<dyn ExtraordinaryLedger>,
}

impl ReportingService {
    pub fn new(
        buildings: Arc<dyn BuildingPort>,
        ledger: Arc<dyn PaymentLedgerPort>,
        extraordinary: Arc<dyn ExtraordinaryLedger>,
    ) -> Self {
        Self {
            buildings,
            ledger,
            extraordinary,
        }
    }

    #[instrument(skip(self))]
    pub async fn get_payment_map(
        &self,
        building_id: BuildingId,
        year: i32,
    ) -> Result<PaymentMap, LedgerError> {
        BillingPeriod::new(year, 1)?;
        let building = self.buildings.get_building(building_id).await?;
        let apartments = self.buildings.list_apartments(building_id).await?;
        let ids: Vec<ApartmentId> = apartments.iter().map(|a| a.id).collect();
        let rows = self.ledger.list_for_apartments(&ids, year).await?;

        let quota = building.monthly_quota;
        let currency = quota.currency();
        let yearly_due = quota.times(12)?;

        let mut by_apartment: HashMap<ApartmentId, BTreeMap<u32, MonthEntry>> = HashMap::new();
        for row in rows {
            by_apartment.entry(row.apartment_id).or_default().insert(
                row.period.month(),
                MonthEntry {
                    status: row.status,
                    amount: row.amount,
                },
            );
        }

        let mut lines = Vec::with_capacity(apartments.len());
        for apartment in apartments {
            let months = by_apartment.remove(&apartment.id).unwrap_or_default();
            let total_paid = Money::sum(
                currency,
                months
                    .values()
                    .filter(|e| matches!(e.status, PaymentStatus::Paid | PaymentStatus::Partial))
                    .map(|e| &e.amount),
            )?;
            let balance = yearly_due.checked_sub(&total_paid)?;
            lines.push(ApartmentPaymentRow {
                apartment_id: apartment.id,
                unit: apartment.unit,
                permillage: apartment.permillage,
                months,
                total_paid,
                balance,
            });
        }

        Ok(PaymentMap {
            building_id,
            year,
            monthly_quota: quota,
            apartments: lines,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_building_stats(
        &self,
        building_id: BuildingId,
        year: i32,
        month: u32,
    ) -> Result<BuildingStats, LedgerError> {
        let period = BillingPeriod::new(year, month)?;
        let building = self.buildings.get_building(building_id).await?;
        let apartments = self.buildings.list_apartments(building_id).await?;
        let ids: Vec<ApartmentId> = apartments.iter().map(|a| a.id).collect();
        let rows = self.ledger.list_for_apartments(&ids, year).await?;
        let installments = self.extraordinary.installments_due(building_id, year).await?;

        let quota = building.monthly_quota;
        let currency = quota.currency();

        let collected_recurring = Money::sum(
            currency,
            rows.iter()
                .filter(|r| r.status == PaymentStatus::Paid)
                .map(|r| &r.amount),
        )?;
        let collected_installments = Money::sum(
            currency,
            installments
                .iter()
                .filter(|i| i.status == PaymentStatus::Paid)
                .map(|i| &i.paid),
        )?;

        let overdue_recurring: Vec<Money> = rows
            .iter()
            .filter(|r| r.status.is_overdue())
            .map(|r| quota.checked_sub(&r.amount).map(|m| m.non_negative()))
            .collect::<Result<_, _>>()?;
        let overdue_installments: Vec<Money> = installments
            .iter()
            .filter(|i| i.status.is_overdue())
            .map(|i| i.expected.checked_sub(&i.paid).map(|m| m.non_negative()))
            .collect::<Result<_, _>>()?;

        let paid_count = rows
            .iter()
            .filter(|r| r.period == period && r.status == PaymentStatus::Paid)
            .count();

        Ok(BuildingStats {
            year,
            month,
            total_collected: collected_recurring.checked_add(&collected_installments)?,
            total_overdue: Money::sum(
                currency,
                overdue_recurring.iter().chain(overdue_installments.iter()),
            )?,
            paid_count,
            total: apartments.len(),
        })
    }
}

/// Mock implementation of ExtraordinaryLedger for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use tokio::sync::RwLock;

    /// Returns whatever installments it was given, filtered by due year
    #[derive(Debug, Default)]
    pub struct StaticExtraordinaryLedger {
        installments: RwLock<Vec<InstallmentAmounts>>,
    }

    impl StaticExtraordinaryLedger {
        pub fn new(installments: Vec<InstallmentAmounts>) -> Self {
            Self {
                installments: RwLock::new(installments),
            }
        }
    }

    impl DomainPort for StaticExtraordinaryLedger {}

    #[async_trait]
    impl ExtraordinaryLedger for StaticExtraordinaryLedger {
        async fn installments_due(
            &self,
            _building_id: BuildingId,
            year: i32,
        ) -> Result<Vec<InstallmentAmounts>, PortError> {
            Ok(self
                .installments
                .read()
                .await
                .iter()
                .filter(|i| i.due.year() == year)
                .cloned()
                .collect())
        }
    }
}
