//! Ledger row status machine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a ledger row (recurring month or installment)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Late,
    /// Paid less than expected
    Partial,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Pending,
        PaymentStatus::Paid,
        PaymentStatus::Late,
        PaymentStatus::Partial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Late => "late",
            PaymentStatus::Partial => "partial",
        }
    }

    /// Whether a row may move from `self` to `target`
    ///
    /// Rewriting the same status is always allowed.
    pub fn can_transition_to(&self, target: PaymentStatus) -> bool {
        use PaymentStatus::*;
        if *self == target {
            return true;
        }
        matches!(
            (self, target),
            (Pending, Paid | Late | Partial)
                | (Late, Paid | Partial | Pending)
                | (Paid, Pending | Partial)
                | (Partial, Paid | Late | Pending)
        )
    }

    /// Statuses from which `self` is reachable in one write
    pub fn predecessors(&self) -> Vec<PaymentStatus> {
        Self::ALL
            .into_iter()
            .filter(|from| from.can_transition_to(*self))
            .collect()
    }

    /// Still owed: pending, late or partial
    pub fn is_open(&self) -> bool {
        !matches!(self, PaymentStatus::Paid)
    }

    /// Counts towards overdue totals
    pub fn is_overdue(&self) -> bool {
        matches!(self, PaymentStatus::Late | PaymentStatus::Partial)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "late" => Ok(PaymentStatus::Late),
            "partial" => Ok(PaymentStatus::Partial),
            other => Err(format!("unknown payment status: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PaymentStatus::*;
    use super::*;

    #[test]
    fn test_transitions() {
        assert!(Pending.can_transition_to(Paid));
        assert!(Pending.can_transition_to(Late));
        assert!(Late.can_transition_to(Pending));
        assert!(Paid.can_transition_to(Pending));
        assert!(Paid.can_transition_to(Partial));
        assert!(Partial.can_transition_to(Partial));

        assert!(!Paid.can_transition_to(Late));
    }

    #[test]
    fn test_every_status_can_rewrite_itself() {
        for status in PaymentStatus::ALL {
            assert!(status.can_transition_to(status));
        }
    }

    #[test]
    fn test_predecessors() {
        assert_eq!(Late.predecessors(), vec![Pending, Late, Partial]);
        assert_eq!(Paid.predecessors(), vec![Pending, Paid, Late, Partial]);
    }

    #[test]
    fn test_round_trip_str() {
        for status in PaymentStatus::ALL {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
        assert!("overdue".parse::<PaymentStatus>().is_err());
    }
}
