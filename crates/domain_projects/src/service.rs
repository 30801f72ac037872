//! Extraordinary project operations

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};

use core_kernel::{
    BillingPeriod, BuildingId, InstallmentId, Money, Percentage, ProjectId, ResidentId,
};
use domain_building::BuildingPort;
use domain_payments::PaymentStatus;

use crate::allocator::build_schedule;
use crate::error::ProjectError;
use crate::ports::{ProjectPatch, ProjectPort};
use crate::project::{ApartmentShare, ExtraordinaryProject, Installment, ProjectStatus};

/// Upper bound on installments per project (ten years of monthly payments)
pub const MAX_INSTALLMENTS: u32 = 120;

/// Input for creating a project
#[derive(Debug, Clone)]
pub struct CreateProject {
    pub building_id: BuildingId,
    pub name: String,
    pub description: Option<String>,
    /// Cents, in the building's currency
    pub total_budget: i64,
    pub num_installments: u32,
    pub start_month: u32,
    pub start_year: i32,
}

/// A project with its collection progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectSummary {
    pub project: ExtraordinaryProject,
    pub total_collected: Money,
    /// Clamped to 100 when overpaid
    pub progress_percent: Percentage,
    pub installment_count: usize,
    pub paid_installments: usize,
}

/// A resident's share of one active project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResidentProjectPayments {
    pub project: ExtraordinaryProject,
    pub installments: Vec<Installment>,
    pub total_share: Money,
    pub total_paid: Money,
    /// Negative when overpaid
    pub balance: Money,
    /// `balance` floored at zero
    pub outstanding: Money,
}

pub struct ProjectService {
    buildings: Arc<dyn BuildingPort>,
    projects: Arc<dyn ProjectPort>,
}

impl ProjectService {
    pub fn new(buildings: Arc<dyn BuildingPort>, projects: Arc<dyn ProjectPort>) -> Self {
        Self {
            buildings,
            projects,
        }
    }

    /// Current apartments of a building, as a project snapshot
    pub async fn snapshot_building(&self, building_id: BuildingId) -> Result<Vec<ApartmentShare>, ProjectError> {
        let apartments = self.buildings.list_apartments(building_id).await?;
        Ok(apartments.iter().map(ApartmentShare::from).collect())
    }

    /// Creates a project and its full installment schedule
    ///
    /// Nothing is written unless every installment row can be generated, and
    /// the project with its rows is stored in a single atomic write.
    ///
    /// # Arguments
    ///
    /// * `input` - Name, budget in cents, installment count and start month
    /// * `snapshot` - Apartments and permillage frozen into the schedule
    ///
    /// # Returns
    ///
    /// The id of the stored project
    ///
    /// # Errors
    ///
    /// * `ProjectError::Validation` naming the offending field, including a
    ///   schedule whose last installment falls after the last supported year
    /// * `ProjectError::InvalidAllocation` if the snapshot weights sum to zero
    /// * `ProjectError::ProjectArchived` if the building is archived
    /// * `ProjectError::NotFound` if the building does not exist
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let snapshot = service.snapshot_building(building_id).await?;
    /// let project_id = service.create_project(input, snapshot).await?;
    /// ```
    #[instrument(skip(self, input, snapshot), fields(building_id = %input.building_id))]
    pub async fn create_project(
        &self,
        input: CreateProject,
        snapshot: Vec<ApartmentShare>,
    ) -> Result<ProjectId, ProjectError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(ProjectError::validation("name", "must not be empty"));
        }
        if input.total_budget <= 0 {
            return Err(ProjectError::validation("total_budget", "must be greater than zero"));
        }
        if input.num_installments == 0 || input.num_installments > MAX_INSTALLMENTS {
            return Err(ProjectError::validation(
                "num_installments",
                format!("must be between 1 and {}", MAX_INSTALLMENTS),
            ));
        }
        let start = BillingPeriod::new(input.start_year, input.start_month)?;
        if start.add_months(input.num_installments - 1).is_err() {
            return Err(ProjectError::validation(
                "num_installments",
                "last installment falls after the last supported year",
            ));
        }
        if snapshot.is_empty() {
            return Err(ProjectError::validation("apartment_snapshot", "must not be empty"));
        }

        let building = self.buildings.get_building(input.building_id).await?;
        if building.is_archived() {
            return Err(ProjectError::ProjectArchived);
        }

        let now = Utc::now();
        let project = ExtraordinaryProject {
            id: ProjectId::new_v7(),
            building_id: input.building_id,
            name: name.to_string(),
            description: input.description,
            total_budget: Money::from_minor(input.total_budget, building.monthly_quota.currency()),
            num_installments: input.num_installments,
            start,
            status: ProjectStatus::Active,
            created_at: now,
            updated_at: now,
        };
        let installments = build_schedule(&project, &snapshot)?;
        let rows = installments.len();

        let project = self.projects.create_project(project, installments).await?;
        info!(project_id = %project.id, installments = rows, "project created");
        Ok(project.id)
    }

    /// Projects of a building with collection progress
    #[instrument(skip(self))]
    pub async fn get_projects(&self, building_id: BuildingId) -> Result<Vec<ProjectSummary>, ProjectError> {
        let projects = self.projects.list_projects(building_id).await?;
        let mut summaries = Vec::with_capacity(projects.len());
        for project in projects {
            let installments = self.projects.list_installments(project.id).await?;
            let total_collected = Money::sum(
                project.total_budget.currency(),
                installments.iter().map(|i| &i.paid_amount),
            )?;
            summaries.push(ProjectSummary {
                progress_percent: Percentage::of(&total_collected, &project.total_budget),
                total_collected,
                installment_count: installments.len(),
                paid_installments: installments
                    .iter()
                    .filter(|i| i.status == PaymentStatus::Paid)
                    .count(),
                project,
            });
        }
        Ok(summaries)
    }

    /// A resident's installments across the active projects they take part in
    #[instrument(skip(self))]
    pub async fn get_resident_extraordinary_payments(
        &self,
        resident_id: ResidentId,
    ) -> Result<Vec<ResidentProjectPayments>, ProjectError> {
        let apartments = self.buildings.apartments_for_resident(resident_id).await?;
        if apartments.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<_> = apartments.iter().map(|a| a.id).collect();
        let rows = self.projects.list_installments_for_apartments(&ids).await?;

        let mut by_project: BTreeMap<ProjectId, Vec<Installment>> = BTreeMap::new();
        for row in rows {
            by_project.entry(row.project_id).or_default().push(row);
        }

        let mut result = Vec::new();
        for (project_id, mut installments) in by_project {
            let project = self.projects.get_project(project_id).await?;
            if project.status != ProjectStatus::Active {
                continue;
            }
            installments.sort_by_key(|i| (i.installment_number, i.unit.clone()));
            let currency = project.total_budget.currency();
            let total_share = Money::sum(currency, installments.iter().map(|i| &i.expected_amount))?;
            let total_paid = Money::sum(currency, installments.iter().map(|i| &i.paid_amount))?;
            let balance = total_share.checked_sub(&total_paid)?;
            result.push(ResidentProjectPayments {
                project,
                installments,
                total_share,
                total_paid,
                outstanding: balance.non_negative(),
                balance,
            });
        }
        Ok(result)
    }

    /// Edits name, description or status of a project
    ///
    /// Budget, installment count and start period cannot change once the
    /// schedule exists.
    #[instrument(skip(self, patch))]
    pub async fn update_project(
        &self,
        project_id: ProjectId,
        mut patch: ProjectPatch,
    ) -> Result<ExtraordinaryProject, ProjectError> {
        let project = self.projects.get_project(project_id).await?;
        if project.is_archived() {
            return Err(ProjectError::ProjectArchived);
        }
        if let Some(name) = patch.name.as_mut() {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                return Err(ProjectError::validation("name", "must not be empty"));
            }
            *name = trimmed.to_string();
        }
        if let Some(target) = patch.status {
            if target != project.status && !project.status.can_transition_to(target) {
                return Err(ProjectError::InvalidTransition {
                    from: project.status,
                    to: target,
                });
            }
        }

        let updated = self
            .projects
            .update_project(project_id, patch, project.status)
            .await?;
        info!(project_id = %project_id, status = %updated.status, "project updated");
        Ok(updated)
    }

    /// Manager edit of one installment row
    ///
    /// Without an amount, `paid` records the expected amount and
    /// `pending`/`late` record zero. `partial` needs an amount strictly
    /// between zero and the expected amount.
    ///
    /// # Errors
    ///
    /// Returns `ProjectError::ProjectArchived` for archived projects or
    /// buildings, `ProjectError::InvalidPaymentTransition` for a disallowed
    /// status change, and `ProjectError::Conflict` when a concurrent write
    /// moved the row first.
    #[instrument(skip(self))]
    pub async fn update_installment_payment(
        &self,
        installment_id: InstallmentId,
        status: PaymentStatus,
        paid_amount: Option<i64>,
    ) -> Result<Installment, ProjectError> {
        let installment = self.projects.get_installment(installment_id).await?;
        self.writable_project(installment.project_id).await?;

        if !installment.status.can_transition_to(status) {
            return Err(ProjectError::InvalidPaymentTransition {
                from: installment.status,
                to: status,
            });
        }
        let paid = resolve_paid_amount(&installment, status, paid_amount)?;

        let updated = self
            .projects
            .update_installment(installment_id, status, paid, &status.predecessors())
            .await?;
        Ok(updated)
    }

    /// Records a bank payment against an installment
    ///
    /// Marks the row `paid` with the transferred amount whatever its current
    /// status.
    #[instrument(skip(self))]
    pub async fn record_bank_payment(
        &self,
        installment_id: InstallmentId,
        amount: Money,
    ) -> Result<Installment, ProjectError> {
        let installment = self.projects.get_installment(installment_id).await?;
        self.writable_project(installment.project_id).await?;
        if amount.currency() != installment.expected_amount.currency() {
            return Err(ProjectError::validation(
                "amount",
                format!("expected {}", installment.expected_amount.currency()),
            ));
        }
        Ok(self
            .projects
            .update_installment(installment_id, PaymentStatus::Paid, amount, &PaymentStatus::ALL)
            .await?)
    }

    pub async fn get_installment(&self, installment_id: InstallmentId) -> Result<Installment, ProjectError> {
        Ok(self.projects.get_installment(installment_id).await?)
    }

    async fn writable_project(&self, project_id: ProjectId) -> Result<ExtraordinaryProject, ProjectError> {
        let project = self.projects.get_project(project_id).await?;
        if project.is_archived() {
            return Err(ProjectError::ProjectArchived);
        }
        let building = self.buildings.get_building(project.building_id).await?;
        if building.is_archived() {
            return Err(ProjectError::ProjectArchived);
        }
        Ok(project)
    }
}

fn resolve_paid_amount(
    installment: &Installment,
    status: PaymentStatus,
    paid_amount: Option<i64>,
) -> Result<Money, ProjectError> {
    let expected = installment.expected_amount;
    if matches!(paid_amount, Some(cents) if cents < 0) {
        return Err(ProjectError::validation("paid_amount", "must not be negative"));
    }
    let cents = match (status, paid_amount) {
        (PaymentStatus::Paid, None) => expected.minor(),
        (PaymentStatus::Partial, None) => {
            return Err(ProjectError::validation("paid_amount", "partial requires an amount"));
        }
        (PaymentStatus::Partial, Some(cents)) if cents == 0 || cents >= expected.minor() => {
            return Err(ProjectError::validation(
                "paid_amount",
                format!("partial amount must be between 0 and {}", expected),
            ));
        }
        (_, Some(cents)) => cents,
        (_, None) => 0,
    };
    Ok(Money::from_minor(cents, expected.currency()))
}
