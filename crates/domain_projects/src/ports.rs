//! Project Domain Ports
//!
//! [`ProjectPort::create_project`] writes the project row and its whole
//! installment schedule as one unit: either everything is visible afterwards
//! or nothing is. Installment writes are conditional on the row's current
//! status and on the owning project not being archived.

use async_trait::async_trait;

use core_kernel::{
    ApartmentId, BuildingId, DomainPort, HealthCheckable, InstallmentId, Money, PortError,
    ProjectId,
};
use domain_payments::PaymentStatus;

use crate::project::{ExtraordinaryProject, Installment, ProjectStatus};

/// Editable fields of a project
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectPatch {
    pub name: Option<String>,
    /// `Some(None)` clears the description
    pub description: Option<Option<String>>,
    pub status: Option<ProjectStatus>,
}

/// Storage port for projects and installments
#[async_trait]
pub trait ProjectPort: DomainPort + HealthCheckable {
    /// Inserts a project and all its installments atomically
    async fn create_project(
        &self,
        project: ExtraordinaryProject,
        installments: Vec<Installment>,
    ) -> Result<ExtraordinaryProject, PortError>;

    async fn get_project(&self, id: ProjectId) -> Result<ExtraordinaryProject, PortError>;

    /// Projects of a building, oldest first
    async fn list_projects(&self, building_id: BuildingId) -> Result<Vec<ExtraordinaryProject>, PortError>;

    /// Applies `patch` if the project is still in `expected_status`
    ///
    /// Fails with `Conflict` when a concurrent write changed the status.
    async fn update_project(
        &self,
        id: ProjectId,
        patch: ProjectPatch,
        expected_status: ProjectStatus,
    ) -> Result<ExtraordinaryProject, PortError>;

    /// Installments of a project, by installment number then creation order
    async fn list_installments(&self, project_id: ProjectId) -> Result<Vec<Installment>, PortError>;

    /// Installments owed by any of the given apartments, across projects
    async fn list_installments_for_apartments(
        &self,
        apartment_ids: &[ApartmentId],
    ) -> Result<Vec<Installment>, PortError>;

    /// Installments due in `year` of the building's non-cancelled projects
    async fn list_installments_due(
        &self,
        building_id: BuildingId,
        year: i32,
    ) -> Result<Vec<Installment>, PortError>;

    async fn get_installment(&self, id: InstallmentId) -> Result<Installment, PortError>;

    /// Sets status and paid amount of one installment
    ///
    /// Fails with `Conflict`, leaving the row untouched, if its current status
    /// is not in `allowed_from` or its project is archived.
    async fn update_installment(
        &self,
        id: InstallmentId,
        status: PaymentStatus,
        paid_amount: Money,
        allowed_from: &[PaymentStatus],
    ) -> Result<Installment, PortError>;
}

/// Mock implementation of ProjectPort for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use chrono::Utc;
    use core_kernel::HealthCheckResult;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::RwLock;

    #[derive(Debug, Default)]
    struct Store {
        projects: HashMap<ProjectId, ExtraordinaryProject>,
        installments: HashMap<ProjectId, Vec<Installment>>,
    }

    /// In-memory mock implementation of ProjectPort
    #[derive(Debug, Default, Clone)]
    pub struct MockProjectPort {
        store: Arc<RwLock<Store>>,
        reject_creates: Arc<AtomicBool>,
    }

    impl MockProjectPort {
        /// Creates a new mock port
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes every subsequent `create_project` fail as a lost connection would
        pub fn reject_creates(&self) {
            self.reject_creates.store(true, Ordering::SeqCst);
        }

        /// Total number of stored installment rows
        pub async fn installment_count(&self) -> usize {
            self.store.read().await.installments.values().map(Vec::len).sum()
        }
    }

    impl DomainPort for MockProjectPort {}

    #[async_trait]
    impl HealthCheckable for MockProjectPort {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "mock-project-port".to_string(),
                status: core_kernel::AdapterHealth::Healthy,
                latency_ms: 0,
                message: Some("Mock adapter always healthy".to_string()),
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl ProjectPort for MockProjectPort {
        async fn create_project(
            &self,
            project: ExtraordinaryProject,
            installments: Vec<Installment>,
        ) -> Result<ExtraordinaryProject, PortError> {
            if self.reject_creates.load(Ordering::SeqCst) {
                return Err(PortError::connection("mock store unavailable"));
            }
            let mut store = self.store.write().await;
            if store.projects.contains_key(&project.id) {
                return Err(PortError::conflict(format!("project {} exists", project.id)));
            }
            store.installments.insert(project.id, installments);
            store.projects.insert(project.id, project.clone());
            Ok(project)
        }

        async fn get_project(&self, id: ProjectId) -> Result<ExtraordinaryProject, PortError> {
            self.store
                .read()
                .await
                .projects
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Project", id))
        }

        async fn list_projects(&self, building_id: BuildingId) -> Result<Vec<ExtraordinaryProject>, PortError> {
            let store = self.store.read().await;
            let mut projects: Vec<ExtraordinaryProject> = store
                .projects
                .values()
                .filter(|p| p.building_id == building_id)
                .cloned()
                .collect();
            projects.sort_by_key(|p| (p.created_at, p.id));
            Ok(projects)
        }

        async fn update_project(
            &self,
            id: ProjectId,
            patch: ProjectPatch,
            expected_status: ProjectStatus,
        ) -> Result<ExtraordinaryProject, PortError> {
            let mut store = self.store.write().await;
            let project = store
                .projects
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("Project", id))?;
            if project.status != expected_status {
                return Err(PortError::conflict(format!(
                    "project is {}, expected {}",
                    project.status, expected_status
                )));
            }
            if let Some(name) = patch.name {
                project.name = name;
            }
            if let Some(description) = patch.description {
                project.description = description;
            }
            if let Some(status) = patch.status {
                project.status = status;
            }
            project.updated_at = Utc::now();
            Ok(project.clone())
        }

        async fn list_installments(&self, project_id: ProjectId) -> Result<Vec<Installment>, PortError> {
            let store = self.store.read().await;
            if !store.projects.contains_key(&project_id) {
                return Err(PortError::not_found("Project", project_id));
            }
            Ok(store.installments.get(&project_id).cloned().unwrap_or_default())
        }

        async fn list_installments_for_apartments(
            &self,
            apartment_ids: &[ApartmentId],
        ) -> Result<Vec<Installment>, PortError> {
            let store = self.store.read().await;
            Ok(store
                .installments
                .values()
                .flatten()
                .filter(|i| apartment_ids.contains(&i.apartment_id))
                .cloned()
                .collect())
        }

        async fn list_installments_due(
            &self,
            building_id: BuildingId,
            year: i32,
        ) -> Result<Vec<Installment>, PortError> {
            let store = self.store.read().await;
            Ok(store
                .projects
                .values()
                .filter(|p| p.building_id == building_id && p.status != ProjectStatus::Cancelled)
                .filter_map(|p| store.installments.get(&p.id))
                .flatten()
                .filter(|i| i.due.year() == year)
                .cloned()
                .collect())
        }

        async fn get_installment(&self, id: InstallmentId) -> Result<Installment, PortError> {
            self.store
                .read()
                .await
                .installments
                .values()
                .flatten()
                .find(|i| i.id == id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Installment", id))
        }

        async fn update_installment(
            &self,
            id: InstallmentId,
            status: PaymentStatus,
            paid_amount: Money,
            allowed_from: &[PaymentStatus],
        ) -> Result<Installment, PortError> {
            let mut store = self.store.write().await;
            let Store {
                projects,
                installments,
            } = &mut *store;
            let row = installments
                .values_mut()
                .flatten()
                .find(|i| i.id == id)
                .ok_or_else(|| PortError::not_found("Installment", id))?;
            let archived = projects
                .get(&row.project_id)
                .map(|p| p.is_archived())
                .unwrap_or(false);
            if archived {
                return Err(PortError::conflict("project is archived"));
            }
            if !allowed_from.contains(&row.status) {
                return Err(PortError::conflict(format!("installment is {}", row.status)));
            }
            row.status = status;
            row.paid_amount = paid_amount;
            row.updated_at = Utc::now();
            Ok(row.clone())
        }
    }
}
