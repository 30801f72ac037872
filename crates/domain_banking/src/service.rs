//! Reconciliation service
//!
//! Imports bank transactions from the provider and settles ledger rows with
//! them. Applying a match is a claim on the transaction (a conditional write
//! on its status) followed by the ledger write; when the ledger write fails
//! the claim is rolled back, so a transaction is never left `matched` to a
//! row that was not settled.

use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use chrono::{Datelike, Days, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, instrument, warn};

use core_kernel::{
    dispatch, ApartmentId, BankTransactionId, BuildingId, Currency, Money, Notification, Notifier,
    PortError, Recipient,
};
use domain_building::{Building, BuildingPort};
use domain_payments::{LedgerService, PaymentLedgerPort};
use domain_projects::{ProjectPort, ProjectService, ProjectStatus};

use crate::error::ReconciliationError;
use crate::matcher::{plan_matches, MatchContext, MatchDecision};
use crate::ports::BankingPort;
use crate::provider::{BankAccount, BankDataProvider, ProviderTransaction};
use crate::transaction::{BankTransaction, MatchStatus, ObligationRef};

/// Tuning for provider calls and the default sync window
#[derive(Debug, Clone)]
pub struct ReconciliationConfig {
    /// Days covered by a sync without an explicit start date
    pub sync_window_days: u64,
    /// Limit for a single provider call
    pub call_timeout_secs: u64,
    /// Retries after the first attempt, for transient failures only
    pub max_retries: u32,
    pub retry_initial_interval_ms: u64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            sync_window_days: 90,
            call_timeout_secs: 30,
            max_retries: 3,
            retry_initial_interval_ms: 200,
        }
    }
}

/// Ports the reconciliation service reads and writes through
#[derive(Clone)]
pub struct ReconciliationPorts {
    pub buildings: Arc<dyn BuildingPort>,
    pub payments: Arc<dyn PaymentLedgerPort>,
    pub projects: Arc<dyn ProjectPort>,
    pub banking: Arc<dyn BankingPort>,
    pub provider: Arc<dyn BankDataProvider>,
    pub notifier: Arc<dyn Notifier>,
}

/// An account whose transactions could not be imported
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountFailure {
    pub account_id: String,
    pub message: String,
}

/// Outcome of a sync run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub accounts_synced: usize,
    pub inserted: usize,
    /// Already imported by an earlier sync
    pub duplicates: usize,
    /// Transactions in an unknown currency
    pub skipped: usize,
    pub failed_accounts: Vec<AccountFailure>,
}

/// Outcome of an automatic matching pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatchingReport {
    pub matched: usize,
    /// Left for manual resolution because several rows ranked first
    pub ambiguous: usize,
    pub unmatched: usize,
    /// Planned matches whose writes failed
    pub failed: usize,
}

pub struct ReconciliationService {
    buildings: Arc<dyn BuildingPort>,
    payments: Arc<dyn PaymentLedgerPort>,
    projects: Arc<dyn ProjectPort>,
    banking: Arc<dyn BankingPort>,
    provider: Arc<dyn BankDataProvider>,
    notifier: Arc<dyn Notifier>,
    ledger: LedgerService,
    project_ledger: ProjectService,
    config: ReconciliationConfig,
}

impl ReconciliationService {
    pub fn new(ports: ReconciliationPorts, config: ReconciliationConfig) -> Self {
        let ledger = LedgerService::new(
            ports.buildings.clone(),
            ports.payments.clone(),
            ports.notifier.clone(),
        );
        let project_ledger = ProjectService::new(ports.buildings.clone(), ports.projects.clone());
        Self {
            buildings: ports.buildings,
            payments: ports.payments,
            projects: ports.projects,
            banking: ports.banking,
            provider: ports.provider,
            notifier: ports.notifier,
            ledger,
            project_ledger,
            config,
        }
    }

    /// Imports the building's bank transactions booked between `from` and `to`
    ///
    /// Defaults to the last `sync_window_days` days up to today. Already
    /// imported transactions are left as they are, whatever their status. An
    /// account that keeps failing is reported and the others still sync.
    ///
    /// # Arguments
    ///
    /// * `building_id` - Building whose accounts are imported
    /// * `from` - First booking date, inclusive
    /// * `to` - Last booking date, inclusive; defaults to today
    ///
    /// # Errors
    ///
    /// * `ReconciliationError::ProjectArchived` if the building is archived
    /// * `ReconciliationError::Validation` if `from` is after `to`
    /// * `ReconciliationError::ExternalService` if the account list cannot be
    ///   fetched after retries
    ///
    /// Per-account failures are not errors; they land in
    /// `SyncReport::failed_accounts`.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let report = service.sync_bank_data(building_id, None, None).await?;
    /// for failure in &report.failed_accounts {
    ///     warn!(account = %failure.account_id, "not synced");
    /// }
    /// ```
    #[instrument(skip(self))]
    pub async fn sync_bank_data(
        &self,
        building_id: BuildingId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<SyncReport, ReconciliationError> {
        let building = self.writable_building(building_id).await?;
        let to = to.unwrap_or_else(|| Utc::now().date_naive());
        let from = match from {
            Some(from) => from,
            None => to
                .checked_sub_days(Days::new(self.config.sync_window_days))
                .unwrap_or(NaiveDate::MIN),
        };
        if from > to {
            return Err(ReconciliationError::validation("from", "must not be after `to`"));
        }

        let accounts = self
            .call_provider("list_accounts", || self.provider.list_accounts(building_id))
            .await
            .map_err(ReconciliationError::ExternalService)?;

        let mut report = SyncReport::default();
        for account in accounts {
            match self.sync_account(&building, &account, from, to, &mut report).await {
                Ok(()) => report.accounts_synced += 1,
                Err(e) => {
                    warn!(account_id = %account.id, error = %e, "account sync failed");
                    report.failed_accounts.push(AccountFailure {
                        account_id: account.id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            accounts = report.accounts_synced,
            inserted = report.inserted,
            duplicates = report.duplicates,
            failed = report.failed_accounts.len(),
            "bank sync finished"
        );
        Ok(report)
    }

    async fn sync_account(
        &self,
        building: &Building,
        account: &BankAccount,
        from: NaiveDate,
        to: NaiveDate,
        report: &mut SyncReport,
    ) -> Result<(), PortError> {
        let transactions = self
            .call_provider("list_transactions", || {
                self.provider.list_transactions(&account.id, from, to)
            })
            .await?;

        for raw in transactions {
            let Some(transaction) = import(building.id, &account.id, raw) else {
                report.skipped += 1;
                continue;
            };
            if self.banking.insert_if_absent(transaction).await? {
                report.inserted += 1;
            } else {
                report.duplicates += 1;
            }
        }
        Ok(())
    }

    /// Calls the provider with a per-call timeout, retrying transient failures
    async fn call_provider<T, F, Fut>(&self, operation: &str, call: F) -> Result<T, PortError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, PortError>>,
    {
        let limit = Duration::from_secs(self.config.call_timeout_secs);
        let max_retries = self.config.max_retries;
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.config.retry_initial_interval_ms))
            .with_max_interval(Duration::from_secs(10))
            .with_max_elapsed_time(None)
            .build();

        let mut attempt = 0u32;
        retry(policy, || {
            attempt += 1;
            let current = attempt;
            let pending = call();
            async move {
                let result = match timeout(limit, pending).await {
                    Ok(result) => result,
                    Err(_) => Err(PortError::Timeout {
                        operation: operation.to_string(),
                        duration_ms: limit.as_millis() as u64,
                    }),
                };
                result.map_err(|e| {
                    if e.is_transient() && current <= max_retries {
                        warn!(operation, attempt = current, error = %e, "provider call failed, retrying");
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        })
        .await
    }

    /// Matches the building's unmatched transactions by counterpart IBAN
    #[instrument(skip(self))]
    pub async fn run_iban_matching(
        &self,
        building_id: BuildingId,
    ) -> Result<MatchingReport, ReconciliationError> {
        let building = self.writable_building(building_id).await?;
        let unmatched = self.banking.list_unmatched(building_id).await?;
        let mut report = MatchingReport::default();
        if unmatched.is_empty() {
            return Ok(report);
        }

        let context = self.match_context(&building, &unmatched).await?;
        let transactions: HashMap<BankTransactionId, &BankTransaction> =
            unmatched.iter().map(|t| (t.id, t)).collect();

        for planned in plan_matches(&unmatched, &context) {
            let Some(transaction) = transactions.get(&planned.transaction_id) else {
                continue;
            };
            match planned.decision {
                MatchDecision::Match(obligation) => {
                    match self
                        .apply_match(transaction, obligation.reference, &[MatchStatus::Unmatched])
                        .await
                    {
                        Ok(_) => {
                            report.matched += 1;
                            self.notify_received(obligation.apartment_id, transaction.amount)
                                .await;
                        }
                        Err(e) => {
                            warn!(transaction_id = %transaction.id, error = %e, "match not applied");
                            report.failed += 1;
                        }
                    }
                }
                MatchDecision::Ambiguous { candidates } => {
                    info!(
                        transaction_id = %transaction.id,
                        candidates = candidates.len(),
                        "ambiguous match left for manual resolution"
                    );
                    report.ambiguous += 1;
                }
                MatchDecision::NoCandidate | MatchDecision::Skipped(_) => report.unmatched += 1,
            }
        }

        info!(
            matched = report.matched,
            ambiguous = report.ambiguous,
            unmatched = report.unmatched,
            failed = report.failed,
            "iban matching finished"
        );
        Ok(report)
    }

    async fn match_context(
        &self,
        building: &Building,
        unmatched: &[BankTransaction],
    ) -> Result<MatchContext, ReconciliationError> {
        let apartments = self.buildings.list_apartments(building.id).await?;
        let apartment_ids: Vec<ApartmentId> = apartments.iter().map(|a| a.id).collect();
        let ibans = self.buildings.list_resident_ibans(building.id).await?;

        let years: BTreeSet<i32> = unmatched.iter().map(|t| t.booking_date.year()).collect();
        let mut recurring = Vec::new();
        for year in years {
            recurring.extend(self.payments.list_for_apartments(&apartment_ids, year).await?);
        }

        let mut installments = Vec::new();
        for project in self.projects.list_projects(building.id).await? {
            if project.status == ProjectStatus::Active {
                installments.extend(self.projects.list_installments(project.id).await?);
            }
        }

        Ok(MatchContext::new(building.monthly_quota)
            .with_ibans(&ibans)
            .with_recurring(recurring)
            .with_installments(installments))
    }

    /// Links a transaction to an obligation chosen by a manager
    ///
    /// No amount or IBAN heuristics apply and any current status is accepted.
    /// Re-linking a matched transaction leaves its previous obligation as it is.
    ///
    /// # Errors
    ///
    /// * `ReconciliationError::NotFound` if the transaction does not exist
    /// * `ReconciliationError::Validation` if the transaction amount is not positive
    /// * `ReconciliationError::ObligationUnavailable` if the obligation does not
    ///   exist or belongs to another building
    /// * `ReconciliationError::Conflict` if another write claimed the
    ///   transaction first
    /// * `ReconciliationError::Ledger` / `ReconciliationError::Project` if the
    ///   obligation cannot be settled, in which case the claim is released
    #[instrument(skip(self))]
    pub async fn manually_match_transaction(
        &self,
        transaction_id: BankTransactionId,
        obligation: ObligationRef,
    ) -> Result<BankTransaction, ReconciliationError> {
        let transaction = self.banking.get_transaction(transaction_id).await?;
        if !transaction.amount.is_positive() {
            return Err(ReconciliationError::validation("amount", "must be positive"));
        }
        let apartment_id = self.obligation_apartment(&transaction, obligation).await?;

        let matched = self
            .apply_match(&transaction, obligation, &MatchStatus::ALL)
            .await?;
        info!(transaction_id = %transaction_id, obligation = %obligation, "transaction matched manually");
        self.notify_received(apartment_id, transaction.amount).await;
        Ok(matched)
    }

    /// Dismisses an unmatched transaction
    #[instrument(skip(self))]
    pub async fn ignore_transaction(
        &self,
        transaction_id: BankTransactionId,
    ) -> Result<BankTransaction, ReconciliationError> {
        let transaction = self.banking.get_transaction(transaction_id).await?;
        if transaction.status != MatchStatus::Unmatched {
            return Err(ReconciliationError::InvalidTransition {
                from: transaction.status,
                to: MatchStatus::Ignored,
            });
        }
        Ok(self.banking.ignore(transaction_id).await?)
    }

    pub async fn get_unmatched_transactions(
        &self,
        building_id: BuildingId,
    ) -> Result<Vec<BankTransaction>, ReconciliationError> {
        self.buildings.get_building(building_id).await?;
        Ok(self.banking.list_unmatched(building_id).await?)
    }

    pub async fn get_transaction(
        &self,
        transaction_id: BankTransactionId,
    ) -> Result<BankTransaction, ReconciliationError> {
        Ok(self.banking.get_transaction(transaction_id).await?)
    }

    /// Claims the transaction, settles the obligation, and releases the claim
    /// if settling fails
    async fn apply_match(
        &self,
        transaction: &BankTransaction,
        obligation: ObligationRef,
        allowed_from: &[MatchStatus],
    ) -> Result<BankTransaction, ReconciliationError> {
        let previous = self
            .banking
            .claim(transaction.id, obligation, allowed_from)
            .await?;

        let settled = match obligation {
            ObligationRef::Recurring {
                apartment_id,
                period,
            } => self
                .ledger
                .record_bank_payment(apartment_id, period, transaction.amount)
                .await
                .map(|_| ())
                .map_err(ReconciliationError::from),
            ObligationRef::Installment { installment_id } => self
                .project_ledger
                .record_bank_payment(installment_id, transaction.amount)
                .await
                .map(|_| ())
                .map_err(ReconciliationError::from),
        };

        if let Err(e) = settled {
            if let Err(restore_err) = self.banking.restore(&previous).await {
                error!(
                    transaction_id = %transaction.id,
                    error = %restore_err,
                    "failed to release transaction claim"
                );
            }
            return Err(e);
        }
        Ok(self.banking.get_transaction(transaction.id).await?)
    }

    /// The apartment owing `obligation`, checked against the transaction's building
    ///
    /// A missing obligation and one owned by another building fail the same way.
    async fn obligation_apartment(
        &self,
        transaction: &BankTransaction,
        obligation: ObligationRef,
    ) -> Result<ApartmentId, ReconciliationError> {
        let (apartment_id, building_id) = match obligation {
            ObligationRef::Recurring { apartment_id, .. } => {
                let apartment = self
                    .buildings
                    .get_apartment(apartment_id)
                    .await
                    .map_err(hide_missing)?;
                (apartment.id, apartment.building_id)
            }
            ObligationRef::Installment { installment_id } => {
                let installment = self
                    .projects
                    .get_installment(installment_id)
                    .await
                    .map_err(hide_missing)?;
                let project = self
                    .projects
                    .get_project(installment.project_id)
                    .await
                    .map_err(hide_missing)?;
                (installment.apartment_id, project.building_id)
            }
        };
        if building_id != transaction.building_id {
            return Err(ReconciliationError::ObligationUnavailable);
        }
        Ok(apartment_id)
    }

    async fn writable_building(&self, building_id: BuildingId) -> Result<Building, ReconciliationError> {
        let building = self.buildings.get_building(building_id).await?;
        if building.is_archived() {
            return Err(ReconciliationError::ProjectArchived);
        }
        Ok(building)
    }

    async fn notify_received(&self, apartment_id: ApartmentId, amount: Money) {
        let resident = match self.buildings.get_apartment(apartment_id).await {
            Ok(apartment) => apartment.resident_id,
            Err(e) => {
                warn!(apartment_id = %apartment_id, error = %e, "cannot resolve payment recipient");
                None
            }
        };
        if let Some(resident_id) = resident {
            dispatch(
                self.notifier.as_ref(),
                Notification::new(
                    Recipient::Resident(resident_id),
                    "Payment received",
                    format!("A bank transfer of {} was applied to your account", amount),
                ),
            )
            .await;
        }
    }
}

fn hide_missing(err: PortError) -> ReconciliationError {
    match err {
        PortError::NotFound { .. } => ReconciliationError::ObligationUnavailable,
        other => other.into(),
    }
}

/// Converts a provider transaction, or `None` for an unknown currency
fn import(building_id: BuildingId, account_id: &str, raw: ProviderTransaction) -> Option<BankTransaction> {
    let Some(currency) = Currency::from_code(&raw.currency) else {
        warn!(external_id = %raw.id, currency = %raw.currency, "unknown currency, transaction skipped");
        return None;
    };
    let mut transaction = BankTransaction::new(
        building_id,
        raw.id,
        account_id,
        Money::from_minor(raw.amount_cents, currency),
        raw.booking_date,
    );
    transaction.counterpart_iban = raw.counterpart_iban;
    transaction.counterpart_name = raw.counterpart_name;
    transaction.description = raw.description;
    Some(transaction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_converts_amount_and_currency() {
        let raw = ProviderTransaction {
            id: "tx-9".to_string(),
            amount_cents: 5000,
            currency: "EUR".to_string(),
            counterpart_iban: Some("DE89370400440532013000".to_string()),
            counterpart_name: Some("Ana".to_string()),
            booking_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            description: None,
        };
        let tx = import(BuildingId::new(), "acc-1", raw).unwrap();
        assert_eq!(tx.amount, Money::from_minor(5000, Currency::EUR));
        assert_eq!(tx.external_id, "tx-9");
        assert_eq!(tx.account_id, "acc-1");
        assert_eq!(tx.status, MatchStatus::Unmatched);
    }

    #[test]
    fn test_import_skips_unknown_currency() {
        let raw = ProviderTransaction {
            id: "tx-10".to_string(),
            amount_cents: 5000,
            currency: "XXX".to_string(),
            counterpart_iban: None,
            counterpart_name: None,
            booking_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            description: None,
        };
        assert!(import(BuildingId::new(), "acc-1", raw).is_none());
    }
}
