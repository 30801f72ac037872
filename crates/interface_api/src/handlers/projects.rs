//! Extraordinary project handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use core_kernel::{BuildingId, InstallmentId, ProjectId};
use domain_projects::{
    CreateProject, ExtraordinaryProject, Installment, ProjectSummary, ResidentProjectPayments,
};
use serde::Serialize;

use crate::access::{self, authorize, Access};
use crate::auth::Claims;
use crate::dto::projects::*;
use crate::error::ApiError;
use crate::handlers::validated;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ProjectCreated {
    pub id: ProjectId,
}

/// Creates a project and its installment schedule in one step
///
/// Shares are allocated from the building's apartments as they are now;
/// later permillage edits do not touch the schedule.
pub async fn create_project(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(building_id): Path<BuildingId>,
    Json(request): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectCreated>), ApiError> {
    authorize(&claims, building_id, Access::Write)?;
    let request = validated(request)?;

    let snapshot = state.projects.snapshot_building(building_id).await?;
    let id = state
        .projects
        .create_project(
            CreateProject {
                building_id,
                name: request.name,
                description: request.description,
                total_budget: request.total_budget_cents,
                num_installments: request.num_installments,
                start_month: request.start_month,
                start_year: request.start_year,
            },
            snapshot,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ProjectCreated { id })))
}

pub async fn list_projects(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(building_id): Path<BuildingId>,
) -> Result<Json<Vec<ProjectSummary>>, ApiError> {
    authorize(&claims, building_id, Access::Read)?;
    Ok(Json(state.projects.get_projects(building_id).await?))
}

pub async fn update_project(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(project_id): Path<ProjectId>,
    Json(request): Json<UpdateProjectRequest>,
) -> Result<Json<ExtraordinaryProject>, ApiError> {
    access::project(&state, &claims, project_id, Access::Write).await?;
    let request = validated(request)?;
    Ok(Json(state.projects.update_project(project_id, request.into()).await?))
}

pub async fn update_installment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(installment_id): Path<InstallmentId>,
    Json(request): Json<UpdateInstallmentRequest>,
) -> Result<Json<Installment>, ApiError> {
    access::installment(&state, &claims, installment_id, Access::Write).await?;
    let request = validated(request)?;

    let installment = state
        .projects
        .update_installment_payment(installment_id, request.status, request.paid_amount_cents)
        .await?;
    Ok(Json(installment))
}

/// The caller's own installments, grouped by project
pub async fn resident_extraordinary_payments(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<ResidentProjectPayments>>, ApiError> {
    let resident_id = claims.resident_id.ok_or(ApiError::Forbidden)?;

    let payments = state
        .projects
        .get_resident_extraordinary_payments(resident_id)
        .await?
        .into_iter()
        .filter(|p| p.project.building_id == claims.building_id)
        .collect();
    Ok(Json(payments))
}
