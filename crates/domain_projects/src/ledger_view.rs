//! Installments as seen by ledger reporting

use async_trait::async_trait;
use std::sync::Arc;

use core_kernel::{BuildingId, DomainPort, PortError};
use domain_payments::{ExtraordinaryLedger, InstallmentAmounts};

use crate::ports::ProjectPort;

/// Adapts a [`ProjectPort`] to the reporting read port
pub struct InstallmentLedgerView {
    projects: Arc<dyn ProjectPort>,
}

impl InstallmentLedgerView {
    pub fn new(projects: Arc<dyn ProjectPort>) -> Self {
        Self { projects }
    }
}

impl DomainPort for InstallmentLedgerView {}

#[async_trait]
impl ExtraordinaryLedger for InstallmentLedgerView {
    async fn installments_due(
        &self,
        building_id: BuildingId,
        year: i32,
    ) -> Result<Vec<InstallmentAmounts>, PortError> {
        Ok(self
            .projects
            .list_installments_due(building_id, year)
            .await?
            .into_iter()
            .map(|i| InstallmentAmounts {
                apartment_id: i.apartment_id,
                due: i.due,
                status: i.status,
                expected: i.expected_amount,
                paid: i.paid_amount,
            })
            .collect())
    }
}
