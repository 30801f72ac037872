//! Payment Ledger Ports
//!
//! The ledger port exposes a single write primitive, [`PaymentLedgerPort::upsert_status`],
//! which must be atomic per (apartment, period) key. The Postgres adapter
//! implements it as one `INSERT .. ON CONFLICT DO UPDATE .. WHERE` statement;
//! the mock holds its write lock across the check and the write.

use async_trait::async_trait;

use core_kernel::{ApartmentId, BillingPeriod, DomainPort, HealthCheckable, PortError};

use crate::payment::{LedgerWrite, RecurringPayment};
use crate::status::PaymentStatus;

/// Storage port for recurring ledger rows
#[async_trait]
pub trait PaymentLedgerPort: DomainPort + HealthCheckable {
    /// Inserts or updates the row for `write.apartment_id` and `write.period`
    ///
    /// An absent row is inserted. An existing row is updated only if its
    /// current status is in `allowed_from`; otherwise the call fails with
    /// `Conflict` and the row is left untouched.
    async fn upsert_status(
        &self,
        write: LedgerWrite,
        allowed_from: &[PaymentStatus],
    ) -> Result<RecurringPayment, PortError>;

    /// Retrieves the row for a key, if it has been written
    async fn get_payment(
        &self,
        apartment_id: ApartmentId,
        period: BillingPeriod,
    ) -> Result<Option<RecurringPayment>, PortError>;

    /// Lists all rows of a year for the given apartments, ordered by period
    async fn list_for_apartments(
        &self,
        apartment_ids: &[ApartmentId],
        year: i32,
    ) -> Result<Vec<RecurringPayment>, PortError>;
}

/// Mock implementation of PaymentLedgerPort for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use chrono::Utc;
    use core_kernel::HealthCheckResult;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    type Key = (ApartmentId, BillingPeriod);

    /// In-memory mock implementation of PaymentLedgerPort
    #[derive(Debug, Default, Clone)]
    pub struct MockPaymentLedgerPort {
        rows: Arc<RwLock<HashMap<Key, RecurringPayment>>>,
    }

    impl MockPaymentLedgerPort {
        /// Creates a new mock port
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of stored rows
        pub async fn row_count(&self) -> usize {
            self.rows.read().await.len()
        }
    }

    impl DomainPort for MockPaymentLedgerPort {}

    #[async_trait]
    impl HealthCheckable for MockPaymentLedgerPort {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "mock-payment-ledger-port".to_string(),
                status: core_kernel::AdapterHealth::Healthy,
                latency_ms: 0,
                message: Some("Mock adapter always healthy".to_string()),
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl PaymentLedgerPort for MockPaymentLedgerPort {
        async fn upsert_status(
            &self,
            write: LedgerWrite,
            allowed_from: &[PaymentStatus],
        ) -> Result<RecurringPayment, PortError> {
            let mut rows = self.rows.write().await;
            let key = (write.apartment_id, write.period);
            match rows.get_mut(&key) {
                Some(row) => {
                    if !allowed_from.contains(&row.status) {
                        return Err(PortError::conflict(format!(
                            "payment for {} is {}",
                            write.period, row.status
                        )));
                    }
                    row.status = write.status;
                    row.amount = write.amount;
                    row.updated_at = Utc::now();
                    Ok(row.clone())
                }
                None => {
                    let row = write.into_row();
                    rows.insert(key, row.clone());
                    Ok(row)
                }
            }
        }

        async fn get_payment(
            &self,
            apartment_id: ApartmentId,
            period: BillingPeriod,
        ) -> Result<Option<RecurringPayment>, PortError> {
            Ok(self.rows.read().await.get(&(apartment_id, period)).cloned())
        }

        async fn list_for_apartments(
            &self,
            apartment_ids: &[ApartmentId],
            year: i32,
        ) -> Result<Vec<RecurringPayment>, PortError> {
            let rows = self.rows.read().await;
            let mut found: Vec<RecurringPayment> = rows
                .values()
                .filter(|r| r.period.year() == year && apartment_ids.contains(&r.apartment_id))
                .cloned()
                .collect();
            found.sort_by_key(|r| (r.period, r.apartment_id));
            Ok(found)
        }
    }
}
