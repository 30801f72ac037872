//! Bank Reconciliation Domain
//!
//! Imports booked transactions from a bank aggregation provider and settles
//! recurring quotas and project installments with them.
//!
//! # Flow
//!
//! 1. [`ReconciliationService::sync_bank_data`] pulls transactions per
//!    account. Imports are idempotent on the provider's transaction id, so a
//!    re-sync of the same window adds nothing and never touches rows that
//!    were already matched or ignored.
//! 2. [`ReconciliationService::run_iban_matching`] pairs unmatched credits
//!    with ledger rows of the apartments whose residents registered the
//!    counterpart IBAN (see [`matcher`] for the ranking).
//! 3. Whatever stays unmatched is resolved by a manager with
//!    [`ReconciliationService::manually_match_transaction`] or
//!    [`ReconciliationService::ignore_transaction`].

pub mod transaction;
pub mod matcher;
pub mod error;
pub mod ports;
pub mod provider;
pub mod service;

pub use transaction::{BankTransaction, MatchStatus, ObligationRef};
pub use matcher::{plan_matches, MatchContext, MatchDecision, Obligation, PlannedMatch, SkipReason};
pub use error::ReconciliationError;
pub use ports::BankingPort;
#[cfg(any(test, feature = "mock"))]
pub use ports::mock::MockBankingPort;
pub use provider::{
    BankAccount, BankApiConfig, BankDataProvider, HttpBankDataProvider, ProviderTransaction,
};
#[cfg(any(test, feature = "mock"))]
pub use provider::mock::MockBankDataProvider;
pub use service::{
    AccountFailure, MatchingReport, ReconciliationConfig, ReconciliationPorts,
    ReconciliationService, SyncReport,
};
