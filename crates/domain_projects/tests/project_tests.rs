//! Project service tests against in-memory ports

use std::sync::Arc;

use core_kernel::{Currency, Money, MoneyError, Permillage, ResidentId};
use domain_building::{Apartment, Building, BuildingPort, BuildingStatus, MockBuildingPort};
use domain_payments::{ExtraordinaryLedger, PaymentStatus};
use domain_projects::{
    ApartmentShare, CreateProject, InstallmentLedgerView, MockProjectPort, ProjectError,
    ProjectPatch, ProjectPort, ProjectService, ProjectStatus,
};

struct Fixture {
    building: Building,
    a: Apartment,
    b: Apartment,
    resident: ResidentId,
    buildings: Arc<MockBuildingPort>,
    projects: Arc<MockProjectPort>,
    service: ProjectService,
}

async fn fixture_with(status: BuildingStatus) -> Fixture {
    let mut building = Building::new("Edificio Sol", Money::from_minor(5000, Currency::EUR));
    building.status = status;
    let resident = ResidentId::new();
    let a = Apartment::new(building.id, "1A", Permillage::new(600).unwrap()).with_resident(resident);
    let b = Apartment::new(building.id, "1B", Permillage::new(400).unwrap());
    let buildings =
        Arc::new(MockBuildingPort::with_building(building.clone(), vec![a.clone(), b.clone()]).await);
    let projects = Arc::new(MockProjectPort::new());
    let service = ProjectService::new(buildings.clone(), projects.clone());
    Fixture {
        building,
        a,
        b,
        resident,
        buildings,
        projects,
        service,
    }
}

async fn fixture() -> Fixture {
    fixture_with(BuildingStatus::Active).await
}

fn input(f: &Fixture, budget: i64, installments: u32) -> CreateProject {
    CreateProject {
        building_id: f.building.id,
        name: "Roof repair".to_string(),
        description: Some("Full waterproofing".to_string()),
        total_budget: budget,
        num_installments: installments,
        start_month: 3,
        start_year: 2024,
    }
}

async fn create(f: &Fixture, budget: i64, installments: u32) -> core_kernel::ProjectId {
    let snapshot = f.service.snapshot_building(f.building.id).await.unwrap();
    f.service
        .create_project(input(f, budget, installments), snapshot)
        .await
        .unwrap()
}

mod creation {
    use super::*;

    #[tokio::test]
    async fn test_creates_full_schedule() {
        let f = fixture().await;
        let id = create(&f, 100000, 2).await;

        let rows = f.projects.list_installments(id).await.unwrap();
        assert_eq!(rows.len(), 4);
        let sum_for = |apt: core_kernel::ApartmentId| -> i64 {
            rows.iter()
                .filter(|r| r.apartment_id == apt)
                .map(|r| r.expected_amount.minor())
                .sum()
        };
        assert_eq!(sum_for(f.a.id), 60000);
        assert_eq!(sum_for(f.b.id), 40000);
    }

    #[tokio::test]
    async fn test_validation_names_field() {
        let f = fixture().await;
        let snapshot = f.service.snapshot_building(f.building.id).await.unwrap();

        let cases: Vec<(CreateProject, &str)> = vec![
            (CreateProject { name: "  ".into(), ..input(&f, 1000, 1) }, "name"),
            (input(&f, 0, 1), "total_budget"),
            (input(&f, 1000, 0), "num_installments"),
            (input(&f, 1000, 121), "num_installments"),
            (CreateProject { start_month: 13, ..input(&f, 1000, 1) }, "start_month"),
        ];
        for (case, expected_field) in cases {
            let err = f.service.create_project(case, snapshot.clone()).await.unwrap_err();
            assert!(
                matches!(err, ProjectError::Validation { ref field, .. } if field == expected_field),
                "expected {} error, got {:?}",
                expected_field,
                err
            );
        }

        let err = f.service.create_project(input(&f, 1000, 1), vec![]).await.unwrap_err();
        assert!(matches!(err, ProjectError::Validation { ref field, .. } if field == "apartment_snapshot"));
        assert_eq!(f.projects.installment_count().await, 0);
    }

    #[tokio::test]
    async fn test_schedule_must_end_within_supported_years() {
        let f = fixture().await;
        let snapshot = f.service.snapshot_building(f.building.id).await.unwrap();
        let late = |installments| CreateProject {
            start_year: 2999,
            start_month: 12,
            ..input(&f, 1000, installments)
        };

        let err = f.service.create_project(late(2), snapshot.clone()).await.unwrap_err();
        assert!(matches!(err, ProjectError::Validation { ref field, .. } if field == "num_installments"));
        assert_eq!(f.projects.installment_count().await, 0);

        let id = f.service.create_project(late(1), snapshot).await.unwrap();
        let rows = f.projects.list_installments(id).await.unwrap();
        assert!(rows.iter().all(|r| r.due.to_string() == "2999-12"));
    }

    #[tokio::test]
    async fn test_zero_weight_snapshot_is_invalid_allocation() {
        let f = fixture().await;
        let snapshot = vec![ApartmentShare {
            apartment_id: f.a.id,
            unit: "1A".into(),
            permillage: Permillage::new(0).unwrap(),
        }];
        let err = f.service.create_project(input(&f, 1000, 1), snapshot).await.unwrap_err();
        assert!(matches!(
            err,
            ProjectError::InvalidAllocation(MoneyError::InvalidAllocationInput(_))
        ));
    }

    #[tokio::test]
    async fn test_storage_failure_leaves_nothing() {
        let f = fixture().await;
        f.projects.reject_creates();
        let snapshot = f.service.snapshot_building(f.building.id).await.unwrap();

        let err = f.service.create_project(input(&f, 1000, 2), snapshot).await.unwrap_err();
        assert!(matches!(err, ProjectError::Storage(_)));
        assert!(f.projects.list_projects(f.building.id).await.unwrap().is_empty());
        assert_eq!(f.projects.installment_count().await, 0);
    }

    #[tokio::test]
    async fn test_archived_building_rejected() {
        let f = fixture_with(BuildingStatus::Archived).await;
        let snapshot = f.service.snapshot_building(f.building.id).await.unwrap();
        let err = f.service.create_project(input(&f, 1000, 1), snapshot).await.unwrap_err();
        assert!(matches!(err, ProjectError::ProjectArchived));
    }

    #[tokio::test]
    async fn test_snapshot_is_frozen() {
        let f = fixture().await;
        let id = create(&f, 1000, 1).await;

        let mut relabelled = f.a.clone();
        relabelled.unit = "9Z".into();
        f.buildings.save_apartment(relabelled).await.unwrap();

        let rows = f.projects.list_installments(id).await.unwrap();
        let row = rows.iter().find(|r| r.apartment_id == f.a.id).unwrap();
        assert_eq!(row.unit, "1A");
        assert_eq!(row.permillage.value(), 600);
    }
}

mod progress {
    use super::*;

    #[tokio::test]
    async fn test_progress_clamped_when_overpaid() {
        let f = fixture().await;
        let id = create(&f, 1000, 1).await;
        let rows = f.projects.list_installments(id).await.unwrap();
        for row in &rows {
            f.service
                .update_installment_payment(row.id, PaymentStatus::Paid, Some(row.expected_amount.minor() * 2))
                .await
                .unwrap();
        }

        let summaries = f.service.get_projects(f.building.id).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].total_collected.minor(), 2000);
        assert_eq!(summaries[0].progress_percent.value(), 100);
        assert_eq!(summaries[0].paid_installments, 2);
    }

    #[tokio::test]
    async fn test_progress_rounds() {
        let f = fixture().await;
        let id = create(&f, 100000, 2).await;
        let rows = f.projects.list_installments(id).await.unwrap();
        let first_a = rows.iter().find(|r| r.apartment_id == f.a.id).unwrap();
        f.service
            .update_installment_payment(first_a.id, PaymentStatus::Paid, None)
            .await
            .unwrap();

        let summaries = f.service.get_projects(f.building.id).await.unwrap();
        assert_eq!(summaries[0].total_collected.minor(), 30000);
        assert_eq!(summaries[0].progress_percent.value(), 30);
    }
}

mod resident {
    use super::*;

    #[tokio::test]
    async fn test_resident_sees_own_installments_of_active_projects() {
        let f = fixture().await;
        let active = create(&f, 100000, 2).await;
        let cancelled = create(&f, 5000, 1).await;
        f.service
            .update_project(
                cancelled,
                ProjectPatch {
                    status: Some(ProjectStatus::Cancelled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let rows = f.projects.list_installments(active).await.unwrap();
        let first = rows.iter().find(|r| r.apartment_id == f.a.id).unwrap();
        f.service
            .update_installment_payment(first.id, PaymentStatus::Paid, Some(40000))
            .await
            .unwrap();

        let payments = f
            .service
            .get_resident_extraordinary_payments(f.resident)
            .await
            .unwrap();
        assert_eq!(payments.len(), 1);
        let p = &payments[0];
        assert_eq!(p.project.id, active);
        assert_eq!(p.installments.len(), 2);
        assert!(p.installments.iter().all(|i| i.apartment_id == f.a.id));
        assert_eq!(p.total_share.minor(), 60000);
        assert_eq!(p.total_paid.minor(), 40000);
        assert_eq!(p.balance.minor(), 20000);
        assert_eq!(p.outstanding.minor(), 20000);
    }

    #[tokio::test]
    async fn test_overpaid_balance_is_negative_outstanding_zero() {
        let f = fixture().await;
        let id = create(&f, 1000, 1).await;
        let rows = f.projects.list_installments(id).await.unwrap();
        let mine = rows.iter().find(|r| r.apartment_id == f.a.id).unwrap();
        f.service
            .update_installment_payment(mine.id, PaymentStatus::Paid, Some(700))
            .await
            .unwrap();

        let payments = f
            .service
            .get_resident_extraordinary_payments(f.resident)
            .await
            .unwrap();
        assert_eq!(payments[0].balance.minor(), -100);
        assert!(payments[0].outstanding.is_zero());
    }

    #[tokio::test]
    async fn test_unknown_resident_has_nothing() {
        let f = fixture().await;
        create(&f, 1000, 1).await;
        let payments = f
            .service
            .get_resident_extraordinary_payments(ResidentId::new())
            .await
            .unwrap();
        assert!(payments.is_empty());
    }
}

mod updates {
    use super::*;

    #[tokio::test]
    async fn test_status_transitions() {
        let f = fixture().await;
        let id = create(&f, 1000, 1).await;

        let done = f
            .service
            .update_project(id, ProjectPatch { status: Some(ProjectStatus::Completed), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(done.status, ProjectStatus::Completed);

        let reopened = f
            .service
            .update_project(id, ProjectPatch { status: Some(ProjectStatus::Active), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(reopened.status, ProjectStatus::Active);

        f.service
            .update_project(id, ProjectPatch { status: Some(ProjectStatus::Cancelled), ..Default::default() })
            .await
            .unwrap();
        let err = f
            .service
            .update_project(id, ProjectPatch { status: Some(ProjectStatus::Active), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, ProjectError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_rename_trims() {
        let f = fixture().await;
        let id = create(&f, 1000, 1).await;
        let updated = f
            .service
            .update_project(
                id,
                ProjectPatch {
                    name: Some("  Facade  ".into()),
                    description: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Facade");
        assert!(updated.description.is_none());
    }

    #[tokio::test]
    async fn test_archived_project_rejects_writes() {
        let f = fixture().await;
        let id = create(&f, 1000, 1).await;
        f.service
            .update_project(id, ProjectPatch { status: Some(ProjectStatus::Archived), ..Default::default() })
            .await
            .unwrap();

        let row = f.projects.list_installments(id).await.unwrap().remove(0);
        let err = f
            .service
            .update_installment_payment(row.id, PaymentStatus::Paid, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProjectError::ProjectArchived));

        let err = f
            .service
            .update_project(id, ProjectPatch { name: Some("New".into()), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, ProjectError::ProjectArchived));
    }

    #[tokio::test]
    async fn test_installment_partial_bounds() {
        let f = fixture().await;
        let id = create(&f, 1000, 1).await;
        let row = f
            .projects
            .list_installments(id)
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.apartment_id == f.a.id)
            .unwrap();

        let err = f
            .service
            .update_installment_payment(row.id, PaymentStatus::Partial, Some(600))
            .await
            .unwrap_err();
        assert!(matches!(err, ProjectError::Validation { ref field, .. } if field == "paid_amount"));

        let updated = f
            .service
            .update_installment_payment(row.id, PaymentStatus::Partial, Some(250))
            .await
            .unwrap();
        assert_eq!(updated.paid_amount.minor(), 250);
    }

    #[tokio::test]
    async fn test_installment_transition_rejected() {
        let f = fixture().await;
        let id = create(&f, 1000, 1).await;
        let row = f.projects.list_installments(id).await.unwrap().remove(0);
        f.service
            .update_installment_payment(row.id, PaymentStatus::Paid, None)
            .await
            .unwrap();
        let err = f
            .service
            .update_installment_payment(row.id, PaymentStatus::Late, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProjectError::InvalidPaymentTransition { .. }));
    }
}

mod ledger_view {
    use super::*;

    #[tokio::test]
    async fn test_view_excludes_cancelled_and_other_years() {
        let f = fixture().await;
        let kept = create(&f, 1200, 12).await; // 2024-03 .. 2025-02
        let cancelled = create(&f, 1000, 1).await;
        f.service
            .update_project(cancelled, ProjectPatch { status: Some(ProjectStatus::Cancelled), ..Default::default() })
            .await
            .unwrap();

        let view = InstallmentLedgerView::new(f.projects.clone());
        let due_2024 = view.installments_due(f.building.id, 2024).await.unwrap();
        // ten months of 2024, two apartments each
        assert_eq!(due_2024.len(), 20);
        let due_2025 = view.installments_due(f.building.id, 2025).await.unwrap();
        assert_eq!(due_2025.len(), 4);

        let all = f.projects.list_installments(kept).await.unwrap();
        assert_eq!(all.len(), 24);
    }
}
