//! In-memory wiring of every port
//!
//! [`MockWorld`] holds one mock per port, shared through `Arc`s, so tests
//! can build any service on top and still inspect or seed the stores.

use std::sync::Arc;

use core_kernel::notify::mock::RecordingNotifier;
use domain_banking::{
    MockBankDataProvider, MockBankingPort, ReconciliationConfig, ReconciliationPorts,
    ReconciliationService,
};
use domain_building::{BuildingService, MockBuildingPort};
use domain_payments::{LedgerService, MockPaymentLedgerPort, ReportingService};
use domain_projects::{InstallmentLedgerView, MockProjectPort, ProjectService};

use crate::builders::TestBuilding;

#[derive(Clone, Default)]
pub struct MockWorld {
    pub buildings: Arc<MockBuildingPort>,
    pub payments: Arc<MockPaymentLedgerPort>,
    pub projects: Arc<MockProjectPort>,
    pub banking: Arc<MockBankingPort>,
    pub provider: Arc<MockBankDataProvider>,
    pub notifier: Arc<RecordingNotifier>,
}

impl MockWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// A world whose building store already holds `building`
    pub async fn with_building(building: &TestBuilding) -> Self {
        let world = Self::new();
        building.seed_into(&world.buildings).await;
        world
    }

    pub fn building_service(&self) -> BuildingService {
        BuildingService::new(self.buildings.clone())
    }

    pub fn ledger_service(&self) -> LedgerService {
        LedgerService::new(self.buildings.clone(), self.payments.clone(), self.notifier.clone())
    }

    pub fn reporting_service(&self) -> ReportingService {
        ReportingService::new(
            self.buildings.clone(),
            self.payments.clone(),
            Arc::new(InstallmentLedgerView::new(self.projects.clone())),
        )
    }

    pub fn project_service(&self) -> ProjectService {
        ProjectService::new(self.buildings.clone(), self.projects.clone())
    }

    pub fn reconciliation_ports(&self) -> ReconciliationPorts {
        ReconciliationPorts {
            buildings: self.buildings.clone(),
            payments: self.payments.clone(),
            projects: self.projects.clone(),
            banking: self.banking.clone(),
            provider: self.provider.clone(),
            notifier: self.notifier.clone(),
        }
    }

    /// Reconciliation with fast retries
    pub fn reconciliation_service(&self) -> ReconciliationService {
        ReconciliationService::new(
            self.reconciliation_ports(),
            ReconciliationConfig {
                max_retries: 2,
                retry_initial_interval_ms: 1,
                call_timeout_secs: 5,
                ..Default::default()
            },
        )
    }
}
