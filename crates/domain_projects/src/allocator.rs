//! Installment schedule generation

use chrono::Utc;

use core_kernel::{allocate_shares, InstallmentId, Money};
use domain_payments::PaymentStatus;

use crate::error::ProjectError;
use crate::project::{ApartmentShare, ExtraordinaryProject, Installment};

/// Generates the full installment schedule of a project
///
/// The budget is first split evenly across installments, then each
/// installment budget is split across `snapshot` by permillage. Rows are
/// ordered by installment number, then by snapshot order. All rows start
/// `pending` with nothing paid.
pub fn build_schedule(
    project: &ExtraordinaryProject,
    snapshot: &[ApartmentShare],
) -> Result<Vec<Installment>, ProjectError> {
    let currency = project.total_budget.currency();
    let numbers: Vec<(u32, u32)> = (1..=project.num_installments).map(|n| (n, 1)).collect();
    let installment_budgets = allocate_shares(project.total_budget.minor(), &numbers)?;

    let weights: Vec<(&ApartmentShare, u32)> = snapshot
        .iter()
        .map(|share| (share, share.permillage.value()))
        .collect();

    let now = Utc::now();
    let mut rows = Vec::with_capacity(snapshot.len() * project.num_installments as usize);
    for (number, budget) in installment_budgets {
        let due = project.start.add_months(number - 1)?;
        for (share, cents) in allocate_shares(budget, &weights)? {
            rows.push(Installment {
                id: InstallmentId::new_v7(),
                project_id: project.id,
                apartment_id: share.apartment_id,
                unit: share.unit.clone(),
                permillage: share.permillage,
                installment_number: number,
                due,
                expected_amount: Money::from_minor(cents, currency),
                paid_amount: Money::zero(currency),
                status: PaymentStatus::Pending,
                updated_at: now,
            });
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::ProjectStatus;
    use core_kernel::{ApartmentId, BillingPeriod, BuildingId, Currency, MoneyError, Permillage, ProjectId};
    use proptest::prelude::*;

    fn project(budget: i64, installments: u32) -> ExtraordinaryProject {
        ExtraordinaryProject {
            id: ProjectId::new(),
            building_id: BuildingId::new(),
            name: "Roof".to_string(),
            description: None,
            total_budget: Money::from_minor(budget, Currency::EUR),
            num_installments: installments,
            start: BillingPeriod::new(2024, 11).unwrap(),
            status: ProjectStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn share(unit: &str, permillage: u32) -> ApartmentShare {
        ApartmentShare {
            apartment_id: ApartmentId::new(),
            unit: unit.to_string(),
            permillage: Permillage::new(permillage).unwrap(),
        }
    }

    #[test]
    fn test_two_apartments_two_installments() {
        let snapshot = vec![share("1A", 600), share("1B", 400)];
        let rows = build_schedule(&project(100000, 2), &snapshot).unwrap();

        assert_eq!(rows.len(), 4);
        let sum_for = |id: ApartmentId| -> i64 {
            rows.iter()
                .filter(|r| r.apartment_id == id)
                .map(|r| r.expected_amount.minor())
                .sum()
        };
        assert_eq!(sum_for(snapshot[0].apartment_id), 60000);
        assert_eq!(sum_for(snapshot[1].apartment_id), 40000);
        let total: i64 = rows.iter().map(|r| r.expected_amount.minor()).sum();
        assert_eq!(total, 100000);
    }

    #[test]
    fn test_due_periods_follow_start() {
        let rows = build_schedule(&project(300, 3), &[share("1A", 1000)]).unwrap();
        let due: Vec<String> = rows.iter().map(|r| r.due.to_string()).collect();
        assert_eq!(due, vec!["2024-11", "2024-12", "2025-01"]);
        let numbers: Vec<u32> = rows.iter().map(|r| r.installment_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_due_period_past_last_year_fails() {
        let mut late = project(200, 2);
        late.start = BillingPeriod::new(2999, 12).unwrap();
        let err = build_schedule(&late, &[share("1A", 1000)]).unwrap_err();
        assert!(matches!(err, ProjectError::Validation { .. }));
    }

    #[test]
    fn test_uneven_budget_remainder_goes_first() {
        let rows = build_schedule(&project(100, 3), &[share("1A", 1000)]).unwrap();
        let amounts: Vec<i64> = rows.iter().map(|r| r.expected_amount.minor()).collect();
        assert_eq!(amounts, vec![34, 33, 33]);
    }

    #[test]
    fn test_rows_start_pending_and_unpaid() {
        let rows = build_schedule(&project(1000, 1), &[share("1A", 500), share("1B", 500)]).unwrap();
        assert!(rows.iter().all(|r| r.status == PaymentStatus::Pending && r.paid_amount.is_zero()));
    }

    #[test]
    fn test_zero_weight_snapshot_fails() {
        let err = build_schedule(&project(1000, 1), &[share("1A", 0)]).unwrap_err();
        assert!(matches!(
            err,
            ProjectError::InvalidAllocation(MoneyError::InvalidAllocationInput(_))
        ));
    }

    proptest! {
        #[test]
        fn schedule_conserves_budget(
            budget in 1i64..100_000_000i64,
            installments in 1u32..=24u32,
            weights in proptest::collection::vec(1u32..=1000u32, 1..20)
        ) {
            let snapshot: Vec<ApartmentShare> = weights
                .iter()
                .enumerate()
                .map(|(i, w)| share(&format!("U{}", i), *w))
                .collect();
            let rows = build_schedule(&project(budget, installments), &snapshot).unwrap();

            prop_assert_eq!(rows.len(), snapshot.len() * installments as usize);
            let total: i64 = rows.iter().map(|r| r.expected_amount.minor()).sum();
            prop_assert_eq!(total, budget);
        }
    }
}
