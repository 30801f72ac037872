//! Banking Ports
//!
//! Two ports serve reconciliation:
//!
//! - [`BankingPort`] stores imported transactions. Inserts are idempotent on
//!   (building, external id) and every status change is a conditional write
//!   on the row's current status.
//! - [`BankDataProvider`](crate::provider::BankDataProvider) reads accounts
//!   and transactions from the bank aggregator.

use async_trait::async_trait;

use core_kernel::{BankTransactionId, BuildingId, DomainPort, HealthCheckable, PortError};

use crate::transaction::{BankTransaction, MatchStatus, ObligationRef};

/// Storage port for imported bank transactions
#[async_trait]
pub trait BankingPort: DomainPort + HealthCheckable {
    /// Inserts a transaction unless one with the same (building, external id)
    /// exists. Returns whether a row was inserted; an existing row is never
    /// modified.
    async fn insert_if_absent(&self, transaction: BankTransaction) -> Result<bool, PortError>;

    async fn get_transaction(&self, id: BankTransactionId) -> Result<BankTransaction, PortError>;

    /// Unmatched transactions of a building, by booking date then external id
    async fn list_unmatched(&self, building_id: BuildingId) -> Result<Vec<BankTransaction>, PortError>;

    /// Marks a transaction matched to `obligation`
    ///
    /// Succeeds only if the current status is in `allowed_from`, otherwise
    /// fails with `Conflict`. Returns the row as it was before the claim.
    async fn claim(
        &self,
        id: BankTransactionId,
        obligation: ObligationRef,
        allowed_from: &[MatchStatus],
    ) -> Result<BankTransaction, PortError>;

    /// Writes back the status and link of a row returned by [`BankingPort::claim`]
    async fn restore(&self, previous: &BankTransaction) -> Result<(), PortError>;

    /// Moves an unmatched transaction to `ignored`; `Conflict` otherwise
    async fn ignore(&self, id: BankTransactionId) -> Result<BankTransaction, PortError>;
}

/// Mock implementation of BankingPort for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use chrono::Utc;
    use core_kernel::HealthCheckResult;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    /// In-memory mock implementation of BankingPort
    #[derive(Debug, Default, Clone)]
    pub struct MockBankingPort {
        transactions: Arc<RwLock<HashMap<BankTransactionId, BankTransaction>>>,
    }

    impl MockBankingPort {
        /// Creates a new mock port
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of stored transactions across all buildings
        pub async fn count(&self) -> usize {
            self.transactions.read().await.len()
        }

        /// All stored transactions of a building, in any status
        pub async fn all_for(&self, building_id: BuildingId) -> Vec<BankTransaction> {
            self.transactions
                .read()
                .await
                .values()
                .filter(|t| t.building_id == building_id)
                .cloned()
                .collect()
        }
    }

    impl DomainPort for MockBankingPort {}

    #[async_trait]
    impl HealthCheckable for MockBankingPort {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "mock-banking-port".to_string(),
                status: core_kernel::AdapterHealth::Healthy,
                latency_ms: 0,
                message: Some("Mock adapter always healthy".to_string()),
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl BankingPort for MockBankingPort {
        async fn insert_if_absent(&self, transaction: BankTransaction) -> Result<bool, PortError> {
            let mut store = self.transactions.write().await;
            let exists = store.values().any(|t| {
                t.building_id == transaction.building_id && t.external_id == transaction.external_id
            });
            if exists {
                return Ok(false);
            }
            store.insert(transaction.id, transaction);
            Ok(true)
        }

        async fn get_transaction(&self, id: BankTransactionId) -> Result<BankTransaction, PortError> {
            self.transactions
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("BankTransaction", id))
        }

        async fn list_unmatched(&self, building_id: BuildingId) -> Result<Vec<BankTransaction>, PortError> {
            let store = self.transactions.read().await;
            let mut unmatched: Vec<BankTransaction> = store
                .values()
                .filter(|t| t.building_id == building_id && t.status == MatchStatus::Unmatched)
                .cloned()
                .collect();
            unmatched.sort_by(|a, b| {
                (a.booking_date, &a.external_id).cmp(&(b.booking_date, &b.external_id))
            });
            Ok(unmatched)
        }

        async fn claim(
            &self,
            id: BankTransactionId,
            obligation: ObligationRef,
            allowed_from: &[MatchStatus],
        ) -> Result<BankTransaction, PortError> {
            let mut store = self.transactions.write().await;
            let row = store
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("BankTransaction", id))?;
            if !allowed_from.contains(&row.status) {
                return Err(PortError::conflict(format!("transaction is {}", row.status)));
            }
            let previous = row.clone();
            row.status = MatchStatus::Matched;
            row.matched_obligation = Some(obligation);
            row.matched_at = Some(Utc::now());
            Ok(previous)
        }

        async fn restore(&self, previous: &BankTransaction) -> Result<(), PortError> {
            let mut store = self.transactions.write().await;
            let row = store
                .get_mut(&previous.id)
                .ok_or_else(|| PortError::not_found("BankTransaction", previous.id))?;
            row.status = previous.status;
            row.matched_obligation = previous.matched_obligation;
            row.matched_at = previous.matched_at;
            Ok(())
        }

        async fn ignore(&self, id: BankTransactionId) -> Result<BankTransaction, PortError> {
            let mut store = self.transactions.write().await;
            let row = store
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("BankTransaction", id))?;
            if row.status != MatchStatus::Unmatched {
                return Err(PortError::conflict(format!("transaction is {}", row.status)));
            }
            row.status = MatchStatus::Ignored;
            Ok(row.clone())
        }
    }
}
