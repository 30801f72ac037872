//! Building resolution for access checks
//!
//! Routes addressed by apartment, project, installment, IBAN or bank
//! transaction first resolve the building that owns the resource. A
//! resource that does not exist is reported exactly like one in another
//! building, so callers cannot discover ids.

use core_kernel::{
    ApartmentId, BankTransactionId, BuildingId, InstallmentId, PortError, ProjectId,
    ResidentIbanId,
};
use domain_banking::BankingPort;
use domain_building::BuildingPort;
use domain_projects::ProjectPort;

use crate::auth::{require_building_access, require_manager, Claims};
use crate::error::ApiError;
use crate::AppState;

/// Whether the route reads or mutates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Checks the caller against a known building
pub fn authorize(claims: &Claims, building_id: BuildingId, access: Access) -> Result<(), ApiError> {
    require_building_access(claims, building_id)?;
    if access == Access::Write {
        require_manager(claims)?;
    }
    Ok(())
}

fn hide_missing(err: PortError) -> ApiError {
    match err {
        PortError::NotFound { .. } => ApiError::Forbidden,
        other => other.into(),
    }
}

pub async fn apartment(
    state: &AppState,
    claims: &Claims,
    id: ApartmentId,
    access: Access,
) -> Result<BuildingId, ApiError> {
    let apartment = state.ports.buildings.get_apartment(id).await.map_err(hide_missing)?;
    authorize(claims, apartment.building_id, access)?;
    Ok(apartment.building_id)
}

pub async fn project(
    state: &AppState,
    claims: &Claims,
    id: ProjectId,
    access: Access,
) -> Result<BuildingId, ApiError> {
    let project = state.ports.projects.get_project(id).await.map_err(hide_missing)?;
    authorize(claims, project.building_id, access)?;
    Ok(project.building_id)
}

pub async fn installment(
    state: &AppState,
    claims: &Claims,
    id: InstallmentId,
    access: Access,
) -> Result<BuildingId, ApiError> {
    let installment = state.ports.projects.get_installment(id).await.map_err(hide_missing)?;
    project(state, claims, installment.project_id, access).await
}

pub async fn transaction(
    state: &AppState,
    claims: &Claims,
    id: BankTransactionId,
    access: Access,
) -> Result<BuildingId, ApiError> {
    let transaction = state.ports.banking.get_transaction(id).await.map_err(hide_missing)?;
    authorize(claims, transaction.building_id, access)?;
    Ok(transaction.building_id)
}

/// IBANs are looked up within the caller's own building only
pub async fn resident_iban(
    state: &AppState,
    claims: &Claims,
    id: ResidentIbanId,
    access: Access,
) -> Result<BuildingId, ApiError> {
    let ibans = state
        .ports
        .buildings
        .list_resident_ibans(claims.building_id)
        .await
        .map_err(hide_missing)?;
    if !ibans.iter().any(|iban| iban.id == id) {
        return Err(ApiError::Forbidden);
    }
    authorize(claims, claims.building_id, access)?;
    Ok(claims.building_id)
}
