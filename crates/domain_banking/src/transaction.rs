//! Imported bank transactions

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{ApartmentId, BankTransactionId, BillingPeriod, BuildingId, InstallmentId, Money};

/// Reconciliation state of an imported transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    #[default]
    Unmatched,
    Matched,
    /// Dismissed by a manager, never matched automatically
    Ignored,
}

impl MatchStatus {
    pub const ALL: [MatchStatus; 3] = [
        MatchStatus::Unmatched,
        MatchStatus::Matched,
        MatchStatus::Ignored,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Unmatched => "unmatched",
            MatchStatus::Matched => "matched",
            MatchStatus::Ignored => "ignored",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unmatched" => Ok(MatchStatus::Unmatched),
            "matched" => Ok(MatchStatus::Matched),
            "ignored" => Ok(MatchStatus::Ignored),
            other => Err(format!("unknown match status: {}", other)),
        }
    }
}

/// A ledger row a transaction can settle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObligationRef {
    /// One apartment's monthly quota
    Recurring {
        apartment_id: ApartmentId,
        period: BillingPeriod,
    },
    Installment { installment_id: InstallmentId },
}

impl fmt::Display for ObligationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObligationRef::Recurring {
                apartment_id,
                period,
            } => write!(f, "{} {}", apartment_id, period),
            ObligationRef::Installment { installment_id } => write!(f, "{}", installment_id),
        }
    }
}

/// A transaction imported from the bank data provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankTransaction {
    pub id: BankTransactionId,
    pub building_id: BuildingId,
    /// Provider's transaction id, unique per building
    pub external_id: String,
    /// Provider's account id
    pub account_id: String,
    pub amount: Money,
    pub counterpart_iban: Option<String>,
    pub counterpart_name: Option<String>,
    pub booking_date: NaiveDate,
    pub description: Option<String>,
    pub status: MatchStatus,
    pub matched_obligation: Option<ObligationRef>,
    pub matched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl BankTransaction {
    /// A fresh, unmatched transaction
    pub fn new(
        building_id: BuildingId,
        external_id: impl Into<String>,
        account_id: impl Into<String>,
        amount: Money,
        booking_date: NaiveDate,
    ) -> Self {
        Self {
            id: BankTransactionId::new_v7(),
            building_id,
            external_id: external_id.into(),
            account_id: account_id.into(),
            amount,
            counterpart_iban: None,
            counterpart_name: None,
            booking_date,
            description: None,
            status: MatchStatus::Unmatched,
            matched_obligation: None,
            matched_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_counterpart(mut self, iban: impl Into<String>, name: Option<String>) -> Self {
        self.counterpart_iban = Some(iban.into());
        self.counterpart_name = name;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Period the transaction was booked in
    pub fn booking_period(&self) -> BillingPeriod {
        BillingPeriod::from_date(self.booking_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;

    #[test]
    fn test_obligation_ref_serializes_tagged() {
        let period = BillingPeriod::new(2024, 3).unwrap();
        let reference = ObligationRef::Recurring {
            apartment_id: ApartmentId::new(),
            period,
        };
        let json = serde_json::to_value(reference).unwrap();
        assert_eq!(json["kind"], "recurring");
        assert_eq!(json["period"]["month"], 3);

        let back: ObligationRef = serde_json::from_value(json).unwrap();
        assert_eq!(back, reference);
    }

    #[test]
    fn test_new_transaction_is_unmatched() {
        let tx = BankTransaction::new(
            BuildingId::new(),
            "ext-1",
            "acc-1",
            Money::from_minor(5000, Currency::EUR),
            NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
        );
        assert_eq!(tx.status, MatchStatus::Unmatched);
        assert!(tx.matched_obligation.is_none());
        assert_eq!(tx.booking_period(), BillingPeriod::new(2024, 3).unwrap());
    }

    #[test]
    fn test_match_status_round_trip() {
        for status in MatchStatus::ALL {
            assert_eq!(status.as_str().parse::<MatchStatus>().unwrap(), status);
        }
        assert!("settled".parse::<MatchStatus>().is_err());
    }
}
