//! Ledger write operations

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use core_kernel::{
    dispatch, validate_month_range, ApartmentId, BillingPeriod, Money, Notification, Notifier,
    Recipient,
};
use domain_building::{Apartment, Building, BuildingPort};

use crate::error::LedgerError;
use crate::payment::{LedgerWrite, RecurringPayment};
use crate::ports::PaymentLedgerPort;
use crate::status::PaymentStatus;

/// Outcome of a bulk range update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkUpdateReport {
    /// Months written successfully
    pub succeeded: Vec<u32>,
    pub failed: Vec<BulkFailure>,
}

impl BulkUpdateReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A month that could not be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkFailure {
    pub month: u32,
    pub reason: String,
}

/// Application service for recurring ledger writes
pub struct LedgerService {
    buildings: Arc<dyn BuildingPort>,
    ledger: Arc<dyn PaymentLedgerPort>,
    notifier: Arc<dyn Notifier>,
}

impl LedgerService {
    pub fn new(
        buildings: Arc<dyn BuildingPort>,
        ledger: Arc<dyn PaymentLedgerPort>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            buildings,
            ledger,
            notifier,
        }
    }

    /// Sets the status of one apartment's quota for one month
    ///
    /// Without an amount, `paid` records the building's monthly quota and
    /// `pending`/`late` record zero. `partial` requires an amount strictly
    /// between zero and the quota. Rewriting the current status is a no-op
    /// apart from the amount.
    ///
    /// # Errors
    ///
    /// * `LedgerError::Validation` for an invalid month or year, or a
    ///   `partial` amount outside the allowed range
    /// * `LedgerError::ProjectArchived` if the building is archived
    /// * `LedgerError::InvalidTransition` if the current status cannot move to
    ///   `status`
    /// * `LedgerError::Conflict` if a concurrent write changed the row first
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        apartment_id: ApartmentId,
        month: u32,
        year: i32,
        status: PaymentStatus,
        amount: Option<i64>,
    ) -> Result<RecurringPayment, LedgerError> {
        let period = BillingPeriod::new(year, month)?;
        let (apartment, building) = self.writable_apartment(apartment_id).await?;
        let amount = resolve_amount(&building, status, amount)?;

        let previous = self
            .ledger
            .get_payment(apartment_id, period)
            .await?
            .map(|row| row.status)
            .unwrap_or_default();
        if !previous.can_transition_to(status) {
            return Err(LedgerError::InvalidTransition {
                from: previous,
                to: status,
            });
        }

        let row = self
            .ledger
            .upsert_status(
                LedgerWrite {
                    apartment_id,
                    period,
                    status,
                    amount,
                },
                &status.predecessors(),
            )
            .await?;
        debug!(apartment_id = %apartment_id, period = %period, "ledger row written");

        if status == PaymentStatus::Late && previous != PaymentStatus::Late {
            self.notify_overdue(&apartment, &building, period).await;
        }
        Ok(row)
    }

    /// Applies `status` to every month of `start_month..=end_month`
    ///
    /// The range is validated before any write. Months are written one at a
    /// time and independently: a failed month does not roll back the others.
    ///
    /// # Errors
    ///
    /// Fails before writing anything on an invalid range or year, or when
    /// `status` is `partial`. Failures of single months are reported in
    /// `BulkUpdateReport::failed` instead.
    #[instrument(skip(self))]
    pub async fn bulk_update(
        &self,
        apartment_id: ApartmentId,
        year: i32,
        start_month: u32,
        end_month: u32,
        status: PaymentStatus,
    ) -> Result<BulkUpdateReport, LedgerError> {
        let months = validate_month_range(start_month, end_month)?;
        BillingPeriod::new(year, start_month)?;
        if status == PaymentStatus::Partial {
            return Err(LedgerError::validation(
                "status",
                "partial requires a per-month amount",
            ));
        }

        let mut report = BulkUpdateReport::default();
        for month in months {
            match self.update_status(apartment_id, month, year, status, None).await {
                Ok(_) => report.succeeded.push(month),
                Err(e) => {
                    warn!(month, error = %e, "bulk update month failed");
                    report.failed.push(BulkFailure {
                        month,
                        reason: e.to_string(),
                    });
                }
            }
        }
        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "bulk update finished"
        );
        Ok(report)
    }

    /// Records a bank payment against a recurring month
    ///
    /// Marks the row `paid` with the transferred amount whatever its current
    /// status. Last write wins against manual edits.
    #[instrument(skip(self))]
    pub async fn record_bank_payment(
        &self,
        apartment_id: ApartmentId,
        period: BillingPeriod,
        amount: Money,
    ) -> Result<RecurringPayment, LedgerError> {
        let (_, building) = self.writable_apartment(apartment_id).await?;
        if amount.currency() != building.monthly_quota.currency() {
            return Err(LedgerError::validation(
                "amount",
                format!("expected {}", building.monthly_quota.currency()),
            ));
        }
        let row = self
            .ledger
            .upsert_status(
                LedgerWrite {
                    apartment_id,
                    period,
                    status: PaymentStatus::Paid,
                    amount,
                },
                &PaymentStatus::ALL,
            )
            .await?;
        Ok(row)
    }

    /// Current row for a key, if any has been written
    pub async fn get_payment(
        &self,
        apartment_id: ApartmentId,
        period: BillingPeriod,
    ) -> Result<Option<RecurringPayment>, LedgerError> {
        Ok(self.ledger.get_payment(apartment_id, period).await?)
    }

    async fn writable_apartment(
        &self,
        apartment_id: ApartmentId,
    ) -> Result<(Apartment, Building), LedgerError> {
        let apartment = self.buildings.get_apartment(apartment_id).await?;
        let building = self.buildings.get_building(apartment.building_id).await?;
        if building.is_archived() {
            return Err(LedgerError::ProjectArchived);
        }
        Ok((apartment, building))
    }

    async fn notify_overdue(&self, apartment: &Apartment, building: &Building, period: BillingPeriod) {
        let recipient = apartment
            .resident_id
            .map(Recipient::Resident)
            .unwrap_or(Recipient::Building(building.id));
        let notification = Notification::new(
            recipient,
            "Quota overdue",
            format!(
                "The {} quota for unit {} at {} is overdue.",
                period, apartment.unit, building.name
            ),
        )
        .with_link(format!("/payments/{}", period.year()));
        dispatch(self.notifier.as_ref(), notification).await;
    }
}

fn resolve_amount(
    building: &Building,
    status: PaymentStatus,
    amount: Option<i64>,
) -> Result<Money, LedgerError> {
    let quota = building.monthly_quota;
    let currency = quota.currency();
    if let Some(cents) = amount {
        if cents < 0 {
            return Err(LedgerError::validation("amount", "must not be negative"));
        }
    }
    let cents = match (status, amount) {
        (PaymentStatus::Paid, None) => quota.minor(),
        (PaymentStatus::Partial, None) => {
            return Err(LedgerError::validation("amount", "partial requires an amount"));
        }
        (PaymentStatus::Partial, Some(cents)) if cents == 0 || cents >= quota.minor() => {
            return Err(LedgerError::validation(
                "amount",
                format!("partial amount must be between 0 and {}", quota),
            ));
        }
        (_, Some(cents)) => cents,
        (_, None) => 0,
    };
    Ok(Money::from_minor(cents, currency))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;

    fn building() -> Building {
        Building::new("Edificio Sol", Money::from_minor(5000, Currency::EUR))
    }

    #[test]
    fn test_paid_defaults_to_quota() {
        let amount = resolve_amount(&building(), PaymentStatus::Paid, None).unwrap();
        assert_eq!(amount.minor(), 5000);
    }

    #[test]
    fn test_pending_and_late_default_to_zero() {
        assert!(resolve_amount(&building(), PaymentStatus::Pending, None).unwrap().is_zero());
        assert!(resolve_amount(&building(), PaymentStatus::Late, None).unwrap().is_zero());
    }

    #[test]
    fn test_partial_bounds() {
        let b = building();
        assert!(resolve_amount(&b, PaymentStatus::Partial, Some(2500)).is_ok());
        assert!(resolve_amount(&b, PaymentStatus::Partial, Some(0)).is_err());
        assert!(resolve_amount(&b, PaymentStatus::Partial, Some(5000)).is_err());
        assert!(resolve_amount(&b, PaymentStatus::Partial, None).is_err());
    }

    #[test]
    fn test_negative_amount_rejected() {
        assert!(resolve_amount(&building(), PaymentStatus::Paid, Some(-1)).is_err());
    }
}
