//! Extraordinary projects and their installment schedules

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{
    ApartmentId, BuildingId, DomainPort, HealthCheckResult, HealthCheckable, InstallmentId, Money,
    Permillage, PortError, ProjectId,
};
use domain_payments::PaymentStatus;
use domain_projects::{ExtraordinaryProject, Installment, ProjectPatch, ProjectPort, ProjectStatus};

use super::{money, names, parse, period};
use crate::error::DatabaseError;
use crate::pool::check_health;

const PROJECT_COLUMNS: &str = "project_id, building_id, name, description, total_budget_cents, \
     currency, num_installments, start_year, start_month, status, created_at, updated_at";

const INSTALLMENT_COLUMNS: &str = "installment_id, project_id, apartment_id, unit, permillage, \
     installment_number, due_year, due_month, expected_cents, paid_cents, currency, status, updated_at";

#[derive(Debug, FromRow)]
struct ProjectRow {
    project_id: Uuid,
    building_id: Uuid,
    name: String,
    description: Option<String>,
    total_budget_cents: i64,
    currency: String,
    num_installments: i32,
    start_year: i32,
    start_month: i32,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProjectRow> for ExtraordinaryProject {
    type Error = DatabaseError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        Ok(ExtraordinaryProject {
            id: ProjectId::from(row.project_id),
            building_id: BuildingId::from(row.building_id),
            name: row.name,
            description: row.description,
            total_budget: money(row.total_budget_cents, &row.currency)?,
            num_installments: u32::try_from(row.num_installments)
                .map_err(|_| DatabaseError::corrupt(format!("installment count {}", row.num_installments)))?,
            start: period(row.start_year, row.start_month)?,
            status: parse(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct InstallmentRow {
    installment_id: Uuid,
    project_id: Uuid,
    apartment_id: Uuid,
    unit: String,
    permillage: i32,
    installment_number: i32,
    due_year: i32,
    due_month: i32,
    expected_cents: i64,
    paid_cents: i64,
    currency: String,
    status: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InstallmentRow> for Installment {
    type Error = DatabaseError;

    fn try_from(row: InstallmentRow) -> Result<Self, Self::Error> {
        let permillage = u32::try_from(row.permillage)
            .ok()
            .and_then(|p| Permillage::new(p).ok())
            .ok_or_else(|| DatabaseError::corrupt(format!("permillage {}", row.permillage)))?;
        Ok(Installment {
            id: InstallmentId::from(row.installment_id),
            project_id: ProjectId::from(row.project_id),
            apartment_id: ApartmentId::from(row.apartment_id),
            unit: row.unit,
            permillage,
            installment_number: u32::try_from(row.installment_number)
                .map_err(|_| DatabaseError::corrupt(format!("installment number {}", row.installment_number)))?,
            due: period(row.due_year, row.due_month)?,
            expected_amount: money(row.expected_cents, &row.currency)?,
            paid_amount: money(row.paid_cents, &row.currency)?,
            status: parse(&row.status)?,
            updated_at: row.updated_at,
        })
    }
}

fn installments(rows: Vec<InstallmentRow>) -> Result<Vec<Installment>, PortError> {
    rows.into_iter()
        .map(|row| Installment::try_from(row).map_err(PortError::from))
        .collect()
}

/// Postgres implementation of [`ProjectPort`]
#[derive(Debug, Clone)]
pub struct PgProjectRepository {
    pool: PgPool,
}

impl PgProjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn project_exists(&self, id: ProjectId) -> Result<bool, DatabaseError> {
        let found: Option<Uuid> =
            sqlx::query_scalar("SELECT project_id FROM extraordinary_projects WHERE project_id = $1")
                .bind(Uuid::from(id))
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }
}

impl DomainPort for PgProjectRepository {}

#[async_trait]
impl HealthCheckable for PgProjectRepository {
    async fn health_check(&self) -> HealthCheckResult {
        check_health(&self.pool, "postgres-project-repository").await
    }
}

#[async_trait]
impl ProjectPort for PgProjectRepository {
    #[instrument(skip(self, project, schedule), fields(project_id = %project.id, rows = schedule.len()))]
    async fn create_project(
        &self,
        project: ExtraordinaryProject,
        schedule: Vec<Installment>,
    ) -> Result<ExtraordinaryProject, PortError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;

        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            r#"
            INSERT INTO extraordinary_projects ({PROJECT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(Uuid::from(project.id))
        .bind(Uuid::from(project.building_id))
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.total_budget.minor())
        .bind(project.total_budget.currency().code())
        .bind(project.num_installments as i32)
        .bind(project.start.year())
        .bind(project.start.month() as i32)
        .bind(project.status.as_str())
        .bind(project.created_at)
        .bind(project.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from)?;

        for installment in &schedule {
            sqlx::query(&format!(
                r#"
                INSERT INTO installments ({INSTALLMENT_COLUMNS})
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                "#
            ))
            .bind(Uuid::from(installment.id))
            .bind(Uuid::from(installment.project_id))
            .bind(Uuid::from(installment.apartment_id))
            .bind(&installment.unit)
            .bind(installment.permillage.value() as i32)
            .bind(installment.installment_number as i32)
            .bind(installment.due.year())
            .bind(installment.due.month() as i32)
            .bind(installment.expected_amount.minor())
            .bind(installment.paid_amount.minor())
            .bind(installment.expected_amount.currency().code())
            .bind(installment.status.as_str())
            .bind(installment.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from)?;
        }

        tx.commit().await.map_err(DatabaseError::from)?;
        debug!("project and schedule stored");
        Ok(ExtraordinaryProject::try_from(row)?)
    }

    async fn get_project(&self, id: ProjectId) -> Result<ExtraordinaryProject, PortError> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM extraordinary_projects WHERE project_id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?
        .ok_or_else(|| DatabaseError::not_found("Project", id))?;
        Ok(ExtraordinaryProject::try_from(row)?)
    }

    async fn list_projects(&self, building_id: BuildingId) -> Result<Vec<ExtraordinaryProject>, PortError> {
        let rows = sqlx::query_as::<_, ProjectRow>(&format!(
            r#"
            SELECT {PROJECT_COLUMNS} FROM extraordinary_projects
            WHERE building_id = $1
            ORDER BY created_at, project_id
            "#
        ))
        .bind(Uuid::from(building_id))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        rows.into_iter()
            .map(|row| ExtraordinaryProject::try_from(row).map_err(PortError::from))
            .collect()
    }

    #[instrument(skip(self, patch))]
    async fn update_project(
        &self,
        id: ProjectId,
        patch: ProjectPatch,
        expected_status: ProjectStatus,
    ) -> Result<ExtraordinaryProject, PortError> {
        let (set_description, description) = match patch.description {
            Some(description) => (true, description),
            None => (false, None),
        };
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            r#"
            UPDATE extraordinary_projects
            SET name = COALESCE($2, name),
                description = CASE WHEN $3 THEN $4 ELSE description END,
                status = COALESCE($5, status),
                updated_at = now()
            WHERE project_id = $1 AND status = $6
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(Uuid::from(id))
        .bind(patch.name)
        .bind(set_description)
        .bind(description)
        .bind(patch.status.map(|s| s.as_str()))
        .bind(expected_status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        match row {
            Some(row) => Ok(ExtraordinaryProject::try_from(row)?),
            None if self.project_exists(id).await? => Err(PortError::conflict(format!(
                "project is no longer {}",
                expected_status
            ))),
            None => Err(DatabaseError::not_found("Project", id).into()),
        }
    }

    async fn list_installments(&self, project_id: ProjectId) -> Result<Vec<Installment>, PortError> {
        if !self.project_exists(project_id).await? {
            return Err(DatabaseError::not_found("Project", project_id).into());
        }
        let rows = sqlx::query_as::<_, InstallmentRow>(&format!(
            r#"
            SELECT {INSTALLMENT_COLUMNS} FROM installments
            WHERE project_id = $1
            ORDER BY installment_number, installment_id
            "#
        ))
        .bind(Uuid::from(project_id))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        installments(rows)
    }

    async fn list_installments_for_apartments(
        &self,
        apartment_ids: &[ApartmentId],
    ) -> Result<Vec<Installment>, PortError> {
        let ids: Vec<Uuid> = apartment_ids.iter().map(|id| Uuid::from(*id)).collect();
        let rows = sqlx::query_as::<_, InstallmentRow>(&format!(
            r#"
            SELECT {INSTALLMENT_COLUMNS} FROM installments
            WHERE apartment_id = ANY($1)
            ORDER BY due_year, due_month, installment_number, installment_id
            "#
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        installments(rows)
    }

    async fn list_installments_due(
        &self,
        building_id: BuildingId,
        year: i32,
    ) -> Result<Vec<Installment>, PortError> {
        let columns = INSTALLMENT_COLUMNS
            .split(", ")
            .map(|c| format!("i.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let rows = sqlx::query_as::<_, InstallmentRow>(&format!(
            r#"
            SELECT {columns}
            FROM installments i
            JOIN extraordinary_projects p ON p.project_id = i.project_id
            WHERE p.building_id = $1 AND p.status <> 'cancelled' AND i.due_year = $2
            ORDER BY i.due_month, i.installment_number, i.installment_id
            "#
        ))
        .bind(Uuid::from(building_id))
        .bind(year)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        installments(rows)
    }

    async fn get_installment(&self, id: InstallmentId) -> Result<Installment, PortError> {
        let row = sqlx::query_as::<_, InstallmentRow>(&format!(
            "SELECT {INSTALLMENT_COLUMNS} FROM installments WHERE installment_id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?
        .ok_or_else(|| DatabaseError::not_found("Installment", id))?;
        Ok(Installment::try_from(row)?)
    }

    /// Guarded by the row's status and its project's status in one statement
    #[instrument(skip(self, allowed_from))]
    async fn update_installment(
        &self,
        id: InstallmentId,
        status: PaymentStatus,
        paid_amount: Money,
        allowed_from: &[PaymentStatus],
    ) -> Result<Installment, PortError> {
        let row = sqlx::query_as::<_, InstallmentRow>(&format!(
            r#"
            UPDATE installments
            SET status = $2, paid_cents = $3, updated_at = now()
            WHERE installment_id = $1
              AND status = ANY($4)
              AND EXISTS (
                  SELECT 1 FROM extraordinary_projects p
                  WHERE p.project_id = installments.project_id AND p.status <> 'archived'
              )
            RETURNING {INSTALLMENT_COLUMNS}
            "#
        ))
        .bind(Uuid::from(id))
        .bind(status.as_str())
        .bind(paid_amount.minor())
        .bind(names(allowed_from, PaymentStatus::as_str))
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        match row {
            Some(row) => Ok(Installment::try_from(row)?),
            None => {
                // Re-read to report why the guard refused the write
                let current = self.get_installment(id).await?;
                let project = self.get_project(current.project_id).await?;
                if project.is_archived() {
                    Err(PortError::conflict("project is archived"))
                } else {
                    Err(PortError::conflict(format!("installment is {}", current.status)))
                }
            }
        }
    }
}
