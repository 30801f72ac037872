//! Bank reconciliation DTOs

use chrono::NaiveDate;
use domain_banking::ObligationRef;
use serde::Deserialize;

/// Optional sync window; missing bounds fall back to the configured window
#[derive(Debug, Default, Deserialize)]
pub struct SyncQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct MatchTransactionRequest {
    pub obligation: ObligationRef,
}
