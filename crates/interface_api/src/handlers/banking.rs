//! Bank sync and reconciliation handlers

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use core_kernel::{BankTransactionId, BillingPeriod, BuildingId};
use domain_banking::{BankTransaction, MatchingReport, ObligationRef, SyncReport};

use crate::access::{self, authorize, Access};
use crate::auth::Claims;
use crate::dto::banking::*;
use crate::error::ApiError;
use crate::AppState;

/// Imports transactions from every account of the building
///
/// Accounts that fail are listed in the report; the others still import.
pub async fn sync_bank_data(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(building_id): Path<BuildingId>,
    Query(query): Query<SyncQuery>,
) -> Result<Json<SyncReport>, ApiError> {
    authorize(&claims, building_id, Access::Write)?;
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(ApiError::Validation("from must not be after to".to_string()));
        }
    }
    let report = state
        .reconciliation
        .sync_bank_data(building_id, query.from, query.to)
        .await?;
    Ok(Json(report))
}

pub async fn list_unmatched_transactions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(building_id): Path<BuildingId>,
) -> Result<Json<Vec<BankTransaction>>, ApiError> {
    authorize(&claims, building_id, Access::Read)?;
    Ok(Json(state.reconciliation.get_unmatched_transactions(building_id).await?))
}

pub async fn run_iban_matching(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(building_id): Path<BuildingId>,
) -> Result<Json<MatchingReport>, ApiError> {
    authorize(&claims, building_id, Access::Write)?;
    Ok(Json(state.reconciliation.run_iban_matching(building_id).await?))
}

pub async fn match_transaction(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(transaction_id): Path<BankTransactionId>,
    Json(request): Json<MatchTransactionRequest>,
) -> Result<Json<BankTransaction>, ApiError> {
    access::transaction(&state, &claims, transaction_id, Access::Write).await?;
    if let ObligationRef::Recurring { period, .. } = request.obligation {
        BillingPeriod::new(period.year(), period.month())
            .map_err(|e| ApiError::Validation(e.to_string()))?;
    }

    let transaction = state
        .reconciliation
        .manually_match_transaction(transaction_id, request.obligation)
        .await?;
    Ok(Json(transaction))
}

pub async fn ignore_transaction(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(transaction_id): Path<BankTransactionId>,
) -> Result<Json<BankTransaction>, ApiError> {
    access::transaction(&state, &claims, transaction_id, Access::Write).await?;
    Ok(Json(state.reconciliation.ignore_transaction(transaction_id).await?))
}
