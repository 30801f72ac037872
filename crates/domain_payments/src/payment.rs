//! Recurring ledger rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ApartmentId, BillingPeriod, Money, PaymentId};

use crate::status::PaymentStatus;

/// One apartment's quota for one month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringPayment {
    pub id: PaymentId,
    pub apartment_id: ApartmentId,
    pub period: BillingPeriod,
    pub status: PaymentStatus,
    pub amount: Money,
    pub updated_at: DateTime<Utc>,
}

/// A status write keyed by (apartment, period)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerWrite {
    pub apartment_id: ApartmentId,
    pub period: BillingPeriod,
    pub status: PaymentStatus,
    pub amount: Money,
}

impl LedgerWrite {
    /// The row this write produces when no row exists yet
    pub fn into_row(self) -> RecurringPayment {
        RecurringPayment {
            id: PaymentId::new_v7(),
            apartment_id: self.apartment_id,
            period: self.period,
            status: self.status,
            amount: self.amount,
            updated_at: Utc::now(),
        }
    }
}
