//! IBAN matching
//!
//! Pairs unmatched bank transactions with the ledger rows they most likely
//! settle. The counterpart IBAN selects the apartments; each apartment
//! contributes its recurring months of the booking year up to the booking
//! month, plus its installments in active projects. Candidates are ranked by
//!
//! 1. open (`pending`, `late`, `partial`) before `paid`
//! 2. amount equal to the expected amount before any other amount
//! 3. earliest due period
//!
//! and a transaction is matched only when one candidate ranks strictly first.
//! Planning is pure: it reads a [`MatchContext`] snapshot and writes nothing.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

use core_kernel::{ApartmentId, BankTransactionId, BillingPeriod, Money};
use domain_building::{Iban, ResidentIban};
use domain_payments::{PaymentStatus, RecurringPayment};
use domain_projects::Installment;

use crate::transaction::{BankTransaction, ObligationRef};

/// A ledger row considered for a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Obligation {
    pub reference: ObligationRef,
    pub apartment_id: ApartmentId,
    pub due: BillingPeriod,
    pub expected: Money,
    pub status: PaymentStatus,
}

impl Obligation {
    fn rank(&self, amount: &Money) -> (bool, bool, BillingPeriod) {
        (!self.status.is_open(), &self.expected != amount, self.due)
    }
}

/// Why a transaction was not considered at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NonPositiveAmount,
    MissingCounterpartIban,
    /// Booked in a currency other than the building's
    CurrencyMismatch,
}

/// Planning result for one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchDecision {
    Match(Obligation),
    /// Several candidates share the best rank
    Ambiguous { candidates: Vec<ObligationRef> },
    NoCandidate,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMatch {
    pub transaction_id: BankTransactionId,
    pub decision: MatchDecision,
}

/// Read snapshot of one building's ledger used for planning
#[derive(Debug, Clone)]
pub struct MatchContext {
    monthly_quota: Money,
    apartments_by_iban: HashMap<String, BTreeSet<ApartmentId>>,
    recurring: HashMap<(ApartmentId, BillingPeriod), PaymentStatus>,
    installments: HashMap<ApartmentId, Vec<Installment>>,
}

impl MatchContext {
    pub fn new(monthly_quota: Money) -> Self {
        Self {
            monthly_quota,
            apartments_by_iban: HashMap::new(),
            recurring: HashMap::new(),
            installments: HashMap::new(),
        }
    }

    pub fn with_ibans<'a>(mut self, ibans: impl IntoIterator<Item = &'a ResidentIban>) -> Self {
        for iban in ibans {
            self.apartments_by_iban
                .entry(iban.iban.as_str().to_string())
                .or_default()
                .insert(iban.apartment_id);
        }
        self
    }

    /// Recurring rows already written; absent months count as pending
    pub fn with_recurring(mut self, rows: impl IntoIterator<Item = RecurringPayment>) -> Self {
        for row in rows {
            self.recurring.insert((row.apartment_id, row.period), row.status);
        }
        self
    }

    /// Installments of the building's active projects
    pub fn with_installments(mut self, installments: impl IntoIterator<Item = Installment>) -> Self {
        for installment in installments {
            self.installments
                .entry(installment.apartment_id)
                .or_default()
                .push(installment);
        }
        self
    }

    /// Every obligation a transaction could settle, unranked
    pub fn candidates(&self, transaction: &BankTransaction) -> Vec<Obligation> {
        let Some(raw) = transaction.counterpart_iban.as_deref() else {
            return Vec::new();
        };
        let Some(apartments) = self.apartments_by_iban.get(&Iban::normalize(raw)) else {
            return Vec::new();
        };

        let mut candidates = Vec::new();
        for &apartment_id in apartments {
            for period in transaction.booking_period().year_to_date() {
                candidates.push(Obligation {
                    reference: ObligationRef::Recurring {
                        apartment_id,
                        period,
                    },
                    apartment_id,
                    due: period,
                    expected: self.monthly_quota,
                    status: self
                        .recurring
                        .get(&(apartment_id, period))
                        .copied()
                        .unwrap_or_default(),
                });
            }
            for installment in self.installments.get(&apartment_id).into_iter().flatten() {
                candidates.push(Obligation {
                    reference: ObligationRef::Installment {
                        installment_id: installment.id,
                    },
                    apartment_id,
                    due: installment.due,
                    expected: installment.expected_amount,
                    status: installment.status,
                });
            }
        }
        candidates
    }

    fn skip_reason(&self, transaction: &BankTransaction) -> Option<SkipReason> {
        if !transaction.amount.is_positive() {
            return Some(SkipReason::NonPositiveAmount);
        }
        match transaction.counterpart_iban.as_deref() {
            None => return Some(SkipReason::MissingCounterpartIban),
            Some(raw) if Iban::normalize(raw).is_empty() => {
                return Some(SkipReason::MissingCounterpartIban)
            }
            Some(_) => {}
        }
        if transaction.amount.currency() != self.monthly_quota.currency() {
            return Some(SkipReason::CurrencyMismatch);
        }
        None
    }
}

/// Decides a match for each transaction, in order
///
/// An obligation chosen for one transaction is not offered to later ones.
pub fn plan_matches(transactions: &[BankTransaction], context: &MatchContext) -> Vec<PlannedMatch> {
    let mut used: HashSet<ObligationRef> = HashSet::new();

    transactions
        .iter()
        .map(|transaction| {
            let decision = match context.skip_reason(transaction) {
                Some(reason) => MatchDecision::Skipped(reason),
                None => decide(transaction, context, &mut used),
            };
            PlannedMatch {
                transaction_id: transaction.id,
                decision,
            }
        })
        .collect()
}

fn decide(
    transaction: &BankTransaction,
    context: &MatchContext,
    used: &mut HashSet<ObligationRef>,
) -> MatchDecision {
    let mut candidates: Vec<Obligation> = context
        .candidates(transaction)
        .into_iter()
        .filter(|c| !used.contains(&c.reference))
        .collect();
    if candidates.is_empty() {
        return MatchDecision::NoCandidate;
    }

    let amount = transaction.amount;
    candidates.sort_by_key(|c| c.rank(&amount));
    let best = candidates[0].rank(&amount);
    let tied: Vec<ObligationRef> = candidates
        .iter()
        .take_while(|c| c.rank(&amount) == best)
        .map(|c| c.reference)
        .collect();
    if tied.len() > 1 {
        return MatchDecision::Ambiguous { candidates: tied };
    }

    let chosen = candidates.swap_remove(0);
    used.insert(chosen.reference);
    MatchDecision::Match(chosen)
}
