//! Recurring ledger and dashboard handlers

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use core_kernel::{ApartmentId, BuildingId};
use domain_payments::{BuildingStats, BulkUpdateReport, PaymentMap, RecurringPayment};

use crate::access::{self, authorize, Access};
use crate::auth::Claims;
use crate::dto::payments::*;
use crate::error::ApiError;
use crate::handlers::validated;
use crate::AppState;

/// Year grid of every apartment's monthly quotas
pub async fn get_payment_map(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(building_id): Path<BuildingId>,
    Query(query): Query<YearQuery>,
) -> Result<Json<PaymentMap>, ApiError> {
    authorize(&claims, building_id, Access::Read)?;
    Ok(Json(state.reporting.get_payment_map(building_id, query.year).await?))
}

/// Collected and overdue totals for one month
pub async fn get_building_stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(building_id): Path<BuildingId>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<BuildingStats>, ApiError> {
    authorize(&claims, building_id, Access::Read)?;
    let query = validated(query)?;
    let stats = state
        .reporting
        .get_building_stats(building_id, query.year, query.month)
        .await?;
    Ok(Json(stats))
}

pub async fn update_payment_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((apartment_id, year, month)): Path<(ApartmentId, i32, u32)>,
    Json(request): Json<UpdatePaymentRequest>,
) -> Result<Json<RecurringPayment>, ApiError> {
    access::apartment(&state, &claims, apartment_id, Access::Write).await?;
    let request = validated(request)?;

    let payment = state
        .ledger
        .update_status(apartment_id, month, year, request.status, request.amount_cents)
        .await?;
    Ok(Json(payment))
}

/// Writes one status across a month range; failed months are reported, not rolled back
pub async fn bulk_update_payments(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(apartment_id): Path<ApartmentId>,
    Json(request): Json<BulkUpdateRequest>,
) -> Result<Json<BulkUpdateReport>, ApiError> {
    access::apartment(&state, &claims, apartment_id, Access::Write).await?;
    let request = validated(request)?;

    let report = state
        .ledger
        .bulk_update(
            apartment_id,
            request.year,
            request.start_month,
            request.end_month,
            request.status,
        )
        .await?;
    Ok(Json(report))
}
