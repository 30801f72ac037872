//! Building, apartment and IBAN handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use core_kernel::{ApartmentId, BuildingId, Currency, Money, ResidentIbanId};
use domain_building::{Apartment, Building, NewApartment, ResidentIban};

use crate::access::{self, authorize, Access};
use crate::auth::{require_manager, Claims};
use crate::dto::buildings::*;
use crate::error::ApiError;
use crate::handlers::validated;
use crate::AppState;

/// Creates a building in `setup`
///
/// The caller's token is scoped to one building, so only managers may create
/// one and the new id is returned for a fresh token to be issued.
pub async fn create_building(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CreateBuildingRequest>,
) -> Result<(StatusCode, Json<Building>), ApiError> {
    require_manager(&claims)?;
    let request = validated(request)?;
    let currency = Currency::from_code(&request.currency)
        .ok_or_else(|| ApiError::Validation(format!("Unsupported currency: {}", request.currency)))?;

    let building = state
        .buildings
        .create_building(
            &request.name,
            request.address,
            Money::from_minor(request.monthly_quota_cents, currency),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(building)))
}

pub async fn add_apartment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(building_id): Path<BuildingId>,
    Json(request): Json<AddApartmentRequest>,
) -> Result<(StatusCode, Json<Apartment>), ApiError> {
    authorize(&claims, building_id, Access::Write)?;
    let request = validated(request)?;

    let apartment = state
        .buildings
        .add_apartment(
            building_id,
            NewApartment {
                unit: request.unit,
                permillage: request.permillage,
                resident_id: request.resident_id,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(apartment)))
}

pub async fn activate_building(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(building_id): Path<BuildingId>,
) -> Result<Json<Building>, ApiError> {
    authorize(&claims, building_id, Access::Write)?;
    Ok(Json(state.buildings.activate_building(building_id).await?))
}

pub async fn archive_building(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(building_id): Path<BuildingId>,
) -> Result<Json<Building>, ApiError> {
    authorize(&claims, building_id, Access::Write)?;
    Ok(Json(state.buildings.archive_building(building_id).await?))
}

pub async fn add_resident_iban(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(apartment_id): Path<ApartmentId>,
    Json(request): Json<AddIbanRequest>,
) -> Result<(StatusCode, Json<ResidentIban>), ApiError> {
    access::apartment(&state, &claims, apartment_id, Access::Write).await?;
    let request = validated(request)?;

    let iban = state
        .buildings
        .add_resident_iban(apartment_id, &request.label, &request.iban, request.is_primary)
        .await?;
    Ok((StatusCode::CREATED, Json(iban)))
}

pub async fn remove_resident_iban(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(iban_id): Path<ResidentIbanId>,
) -> Result<StatusCode, ApiError> {
    access::resident_iban(&state, &claims, iban_id, Access::Write).await?;
    state.buildings.remove_resident_iban(iban_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
