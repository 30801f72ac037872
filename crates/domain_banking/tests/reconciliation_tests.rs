//! Reconciliation tests against in-memory ports and a mock bank provider

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use core_kernel::notify::mock::RecordingNotifier;
use core_kernel::{
    ApartmentId, BillingPeriod, BuildingId, Currency, InstallmentId, Money, Permillage, Recipient,
    ResidentId,
};
use domain_banking::{
    BankAccount, BankTransaction, BankingPort, MatchStatus, MockBankDataProvider, MockBankingPort,
    ObligationRef, ProviderTransaction, ReconciliationConfig, ReconciliationError,
    ReconciliationPorts, ReconciliationService,
};
use domain_building::{Apartment, Building, BuildingPort, BuildingStatus, Iban, MockBuildingPort, ResidentIban};
use domain_payments::{MockPaymentLedgerPort, PaymentLedgerPort, PaymentStatus};
use domain_projects::{
    CreateProject, MockProjectPort, ProjectPatch, ProjectPort, ProjectService, ProjectStatus,
};

const IBAN_A: &str = "DE89370400440532013000";
const ACCOUNT: &str = "acc-1";

struct Fixture {
    building: Building,
    a: Apartment,
    b: Apartment,
    resident: ResidentId,
    buildings: Arc<MockBuildingPort>,
    payments: Arc<MockPaymentLedgerPort>,
    projects: Arc<MockProjectPort>,
    banking: Arc<MockBankingPort>,
    provider: Arc<MockBankDataProvider>,
    notifier: Arc<RecordingNotifier>,
    service: ReconciliationService,
}

fn config() -> ReconciliationConfig {
    ReconciliationConfig {
        max_retries: 2,
        retry_initial_interval_ms: 1,
        call_timeout_secs: 5,
        ..Default::default()
    }
}

async fn fixture() -> Fixture {
    let mut building = Building::new("Edificio Sol", Money::from_minor(5000, Currency::EUR));
    building.status = BuildingStatus::Active;
    let resident = ResidentId::new();
    let a = Apartment::new(building.id, "1A", Permillage::new(600).unwrap()).with_resident(resident);
    let b = Apartment::new(building.id, "1B", Permillage::new(400).unwrap());
    let buildings =
        Arc::new(MockBuildingPort::with_building(building.clone(), vec![a.clone(), b.clone()]).await);
    buildings
        .add_resident_iban(ResidentIban::new(a.id, "main", Iban::parse(IBAN_A).unwrap(), true))
        .await
        .unwrap();

    let payments = Arc::new(MockPaymentLedgerPort::new());
    let projects = Arc::new(MockProjectPort::new());
    let banking = Arc::new(MockBankingPort::new());
    let provider = Arc::new(MockBankDataProvider::new());
    let notifier = Arc::new(RecordingNotifier::new());

    let service = ReconciliationService::new(
        ReconciliationPorts {
            buildings: buildings.clone(),
            payments: payments.clone(),
            projects: projects.clone(),
            banking: banking.clone(),
            provider: provider.clone(),
            notifier: notifier.clone(),
        },
        config(),
    );

    Fixture {
        building,
        a,
        b,
        resident,
        buildings,
        payments,
        projects,
        banking,
        provider,
        notifier,
        service,
    }
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn period(month: u32) -> BillingPeriod {
    BillingPeriod::new(2024, month).unwrap()
}

fn credit(id: &str, cents: i64, booked: NaiveDate, iban: Option<&str>) -> ProviderTransaction {
    ProviderTransaction {
        id: id.to_string(),
        amount_cents: cents,
        currency: "EUR".to_string(),
        counterpart_iban: iban.map(str::to_string),
        counterpart_name: Some("Ana Costa".to_string()),
        booking_date: booked,
        description: Some("Quota".to_string()),
    }
}

fn account(id: &str) -> BankAccount {
    BankAccount {
        id: id.to_string(),
        iban: Some("PT50000201231234567890154".to_string()),
        name: Some("Condominium".to_string()),
    }
}

/// Stores a transaction directly, as a prior sync would have
async fn stored(f: &Fixture, external_id: &str, cents: i64, booked: NaiveDate, iban: Option<&str>) -> BankTransaction {
    let mut tx = BankTransaction::new(
        f.building.id,
        external_id,
        ACCOUNT,
        Money::from_minor(cents, Currency::EUR),
        booked,
    );
    if let Some(iban) = iban {
        tx = tx.with_counterpart(iban, None);
    }
    assert!(f.banking.insert_if_absent(tx.clone()).await.unwrap());
    tx
}

mod sync {
    use super::*;

    #[tokio::test]
    async fn test_resync_is_idempotent() {
        let f = fixture().await;
        f.provider
            .add_account(
                f.building.id,
                account(ACCOUNT),
                vec![
                    credit("t1", 5000, date(2024, 3, 2), Some(IBAN_A)),
                    credit("t2", 7000, date(2024, 3, 9), None),
                ],
            )
            .await;

        let first = f
            .service
            .sync_bank_data(f.building.id, Some(date(2024, 1, 1)), Some(date(2024, 3, 31)))
            .await
            .unwrap();
        assert_eq!(first.accounts_synced, 1);
        assert_eq!(first.inserted, 2);
        assert_eq!(first.duplicates, 0);

        let second = f
            .service
            .sync_bank_data(f.building.id, Some(date(2024, 1, 1)), Some(date(2024, 3, 31)))
            .await
            .unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 2);
        assert_eq!(f.banking.count().await, 2);
    }

    #[tokio::test]
    async fn test_resync_leaves_matched_rows_alone() {
        let f = fixture().await;
        f.provider
            .add_account(
                f.building.id,
                account(ACCOUNT),
                vec![credit("t1", 5000, date(2024, 1, 5), Some(IBAN_A))],
            )
            .await;
        let window = (Some(date(2024, 1, 1)), Some(date(2024, 1, 31)));

        f.service.sync_bank_data(f.building.id, window.0, window.1).await.unwrap();
        f.service.run_iban_matching(f.building.id).await.unwrap();
        f.service.sync_bank_data(f.building.id, window.0, window.1).await.unwrap();

        let all = f.banking.all_for(f.building.id).await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, MatchStatus::Matched);
    }

    #[tokio::test]
    async fn test_window_filters_booking_dates() {
        let f = fixture().await;
        let today = Utc::now().date_naive();
        f.provider
            .add_account(
                f.building.id,
                account(ACCOUNT),
                vec![
                    credit("old", 5000, today.checked_sub_days(Days::new(120)).unwrap(), Some(IBAN_A)),
                    credit("recent", 5000, today.checked_sub_days(Days::new(10)).unwrap(), Some(IBAN_A)),
                ],
            )
            .await;

        let report = f.service.sync_bank_data(f.building.id, None, None).await.unwrap();
        assert_eq!(report.inserted, 1);
        let all = f.banking.all_for(f.building.id).await;
        assert_eq!(all[0].external_id, "recent");
    }

    #[tokio::test]
    async fn test_partial_failure_is_reported() {
        let f = fixture().await;
        f.provider
            .add_account(
                f.building.id,
                account(ACCOUNT),
                vec![credit("t1", 5000, date(2024, 2, 1), Some(IBAN_A))],
            )
            .await;
        f.provider
            .add_account(
                f.building.id,
                account("acc-2"),
                vec![credit("t2", 5000, date(2024, 2, 1), Some(IBAN_A))],
            )
            .await;
        f.provider.fail_account("acc-2", None).await;

        let report = f
            .service
            .sync_bank_data(f.building.id, Some(date(2024, 1, 1)), Some(date(2024, 2, 28)))
            .await
            .unwrap();

        assert_eq!(report.accounts_synced, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.failed_accounts.len(), 1);
        assert_eq!(report.failed_accounts[0].account_id, "acc-2");
        // first attempt plus two retries
        assert_eq!(f.provider.calls("acc-2").await, 3);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let f = fixture().await;
        f.provider
            .add_account(
                f.building.id,
                account(ACCOUNT),
                vec![credit("t1", 5000, date(2024, 2, 1), Some(IBAN_A))],
            )
            .await;
        f.provider.fail_account(ACCOUNT, Some(2)).await;

        let report = f
            .service
            .sync_bank_data(f.building.id, Some(date(2024, 1, 1)), Some(date(2024, 2, 28)))
            .await
            .unwrap();

        assert!(report.failed_accounts.is_empty());
        assert_eq!(report.inserted, 1);
        assert_eq!(f.provider.calls(ACCOUNT).await, 3);
    }

    #[tokio::test]
    async fn test_account_listing_failure_is_external_error() {
        let f = fixture().await;
        f.provider.fail_accounts_listing().await;

        let err = f.service.sync_bank_data(f.building.id, None, None).await.unwrap_err();
        assert!(matches!(err, ReconciliationError::ExternalService(_)));
    }

    #[tokio::test]
    async fn test_inverted_window_is_rejected() {
        let f = fixture().await;
        let err = f
            .service
            .sync_bank_data(f.building.id, Some(date(2024, 3, 1)), Some(date(2024, 2, 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconciliationError::Validation { ref field, .. } if field == "from"));
    }
}

mod matching {
    use super::*;

    #[tokio::test]
    async fn test_matches_earliest_open_month() {
        let f = fixture().await;
        let tx = stored(&f, "t1", 5000, date(2024, 3, 14), Some(IBAN_A)).await;

        let report = f.service.run_iban_matching(f.building.id).await.unwrap();
        assert_eq!(report.matched, 1);

        let row = f.payments.get_payment(f.a.id, period(1)).await.unwrap().unwrap();
        assert_eq!(row.status, PaymentStatus::Paid);
        assert_eq!(row.amount.minor(), 5000);

        let linked = f.banking.get_transaction(tx.id).await.unwrap();
        assert_eq!(linked.status, MatchStatus::Matched);
        assert_eq!(
            linked.matched_obligation,
            Some(ObligationRef::Recurring {
                apartment_id: f.a.id,
                period: period(1),
            })
        );
        assert!(linked.matched_at.is_some());

        let sent = f.notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, Recipient::Resident(f.resident));
    }

    #[tokio::test]
    async fn test_consecutive_transfers_settle_consecutive_months() {
        let f = fixture().await;
        stored(&f, "t1", 5000, date(2024, 2, 1), Some(IBAN_A)).await;
        stored(&f, "t2", 5000, date(2024, 2, 20), Some(IBAN_A)).await;

        let report = f.service.run_iban_matching(f.building.id).await.unwrap();
        assert_eq!(report.matched, 2);
        for month in [1, 2] {
            let row = f.payments.get_payment(f.a.id, period(month)).await.unwrap().unwrap();
            assert_eq!(row.status, PaymentStatus::Paid);
        }
    }

    #[tokio::test]
    async fn test_shared_iban_tie_is_left_unmatched() {
        let f = fixture().await;
        f.buildings
            .add_resident_iban(ResidentIban::new(f.b.id, "joint", Iban::parse(IBAN_A).unwrap(), true))
            .await
            .unwrap();
        let tx = stored(&f, "t1", 5000, date(2024, 1, 10), Some(IBAN_A)).await;

        let report = f.service.run_iban_matching(f.building.id).await.unwrap();
        assert_eq!(report.ambiguous, 1);
        assert_eq!(report.matched, 0);
        assert_eq!(f.payments.row_count().await, 0);
        assert_eq!(
            f.banking.get_transaction(tx.id).await.unwrap().status,
            MatchStatus::Unmatched
        );
    }

    #[tokio::test]
    async fn test_unknown_and_missing_ibans_stay_unmatched() {
        let f = fixture().await;
        stored(&f, "t1", 5000, date(2024, 1, 10), Some("GB82WEST12345698765432")).await;
        stored(&f, "t2", 5000, date(2024, 1, 11), None).await;
        stored(&f, "t3", -5000, date(2024, 1, 12), Some(IBAN_A)).await;

        let report = f.service.run_iban_matching(f.building.id).await.unwrap();
        assert_eq!(report.unmatched, 3);
        assert_eq!(f.service.get_unmatched_transactions(f.building.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_exact_installment_amount_wins() {
        let f = fixture().await;
        let projects = ProjectService::new(f.buildings.clone(), f.projects.clone());
        let snapshot = projects.snapshot_building(f.building.id).await.unwrap();
        let project_id = projects
            .create_project(
                CreateProject {
                    building_id: f.building.id,
                    name: "Roof repair".to_string(),
                    description: None,
                    total_budget: 100000,
                    num_installments: 2,
                    start_month: 1,
                    start_year: 2024,
                },
                snapshot,
            )
            .await
            .unwrap();
        // apartment A owes 30000 per installment
        stored(&f, "t1", 30000, date(2024, 2, 3), Some(IBAN_A)).await;

        let report = f.service.run_iban_matching(f.building.id).await.unwrap();
        assert_eq!(report.matched, 1);

        let installments = f.projects.list_installments(project_id).await.unwrap();
        let first = installments
            .iter()
            .find(|i| i.apartment_id == f.a.id && i.installment_number == 1)
            .unwrap();
        assert_eq!(first.status, PaymentStatus::Paid);
        assert_eq!(first.paid_amount.minor(), 30000);
        assert_eq!(f.payments.row_count().await, 0);
    }

    #[tokio::test]
    async fn test_archived_building_rejects_matching() {
        let f = fixture().await;
        f.buildings
            .transition_building(f.building.id, BuildingStatus::Active, BuildingStatus::Archived)
            .await
            .unwrap();

        let err = f.service.run_iban_matching(f.building.id).await.unwrap_err();
        assert!(matches!(err, ReconciliationError::ProjectArchived));
    }
}

mod manual {
    use super::*;

    #[tokio::test]
    async fn test_manual_match_ignores_heuristics() {
        let f = fixture().await;
        // unknown IBAN and an amount that fits nothing
        let tx = stored(&f, "t1", 1234, date(2024, 5, 2), Some("GB82WEST12345698765432")).await;
        let obligation = ObligationRef::Recurring {
            apartment_id: f.b.id,
            period: period(4),
        };

        let matched = f.service.manually_match_transaction(tx.id, obligation).await.unwrap();
        assert_eq!(matched.status, MatchStatus::Matched);
        assert_eq!(matched.matched_obligation, Some(obligation));

        let row = f.payments.get_payment(f.b.id, period(4)).await.unwrap().unwrap();
        assert_eq!(row.status, PaymentStatus::Paid);
        assert_eq!(row.amount.minor(), 1234);
    }

    #[tokio::test]
    async fn test_relink_keeps_previous_obligation_state() {
        let f = fixture().await;
        let tx = stored(&f, "t1", 5000, date(2024, 3, 2), Some(IBAN_A)).await;
        f.service.run_iban_matching(f.building.id).await.unwrap();

        let target = ObligationRef::Recurring {
            apartment_id: f.a.id,
            period: period(3),
        };
        let relinked = f.service.manually_match_transaction(tx.id, target).await.unwrap();
        assert_eq!(relinked.matched_obligation, Some(target));

        for month in [1, 3] {
            let row = f.payments.get_payment(f.a.id, period(month)).await.unwrap().unwrap();
            assert_eq!(row.status, PaymentStatus::Paid);
        }
    }

    #[tokio::test]
    async fn test_failed_settlement_releases_claim() {
        let f = fixture().await;
        let projects = ProjectService::new(f.buildings.clone(), f.projects.clone());
        let snapshot = projects.snapshot_building(f.building.id).await.unwrap();
        let project_id = projects
            .create_project(
                CreateProject {
                    building_id: f.building.id,
                    name: "Facade".to_string(),
                    description: None,
                    total_budget: 20000,
                    num_installments: 1,
                    start_month: 1,
                    start_year: 2024,
                },
                snapshot,
            )
            .await
            .unwrap();
        let installment = f.projects.list_installments(project_id).await.unwrap().remove(0);
        projects
            .update_project(
                project_id,
                ProjectPatch {
                    status: Some(ProjectStatus::Archived),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let tx = stored(&f, "t1", 12000, date(2024, 1, 20), Some(IBAN_A)).await;

        let err = f
            .service
            .manually_match_transaction(
                tx.id,
                ObligationRef::Installment {
                    installment_id: installment.id,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReconciliationError::Project(_)));

        let released = f.banking.get_transaction(tx.id).await.unwrap();
        assert_eq!(released.status, MatchStatus::Unmatched);
        assert!(released.matched_obligation.is_none());
    }

    #[tokio::test]
    async fn test_foreign_and_missing_obligations_fail_alike() {
        let f = fixture().await;
        let tx = stored(&f, "t1", 5000, date(2024, 1, 20), Some(IBAN_A)).await;
        let mut other = Building::new("Edificio Luna", Money::from_minor(5000, Currency::EUR));
        other.status = BuildingStatus::Active;
        let stranger = Apartment::new(other.id, "9Z", Permillage::new(1000).unwrap());
        f.buildings.seed(other, vec![stranger.clone()]).await;

        let foreign = f
            .service
            .manually_match_transaction(
                tx.id,
                ObligationRef::Recurring {
                    apartment_id: stranger.id,
                    period: period(1),
                },
            )
            .await
            .unwrap_err();
        let missing = f
            .service
            .manually_match_transaction(
                tx.id,
                ObligationRef::Recurring {
                    apartment_id: ApartmentId::new(),
                    period: period(1),
                },
            )
            .await
            .unwrap_err();
        let missing_installment = f
            .service
            .manually_match_transaction(
                tx.id,
                ObligationRef::Installment {
                    installment_id: InstallmentId::new(),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(foreign, ReconciliationError::ObligationUnavailable));
        assert!(matches!(missing, ReconciliationError::ObligationUnavailable));
        assert!(matches!(missing_installment, ReconciliationError::ObligationUnavailable));
        assert_eq!(foreign.to_string(), missing.to_string());
        assert_eq!(
            f.banking.get_transaction(tx.id).await.unwrap().status,
            MatchStatus::Unmatched
        );
    }

    #[tokio::test]
    async fn test_ignore_only_from_unmatched() {
        let f = fixture().await;
        let tx = stored(&f, "t1", 5000, date(2024, 1, 20), None).await;

        let ignored = f.service.ignore_transaction(tx.id).await.unwrap();
        assert_eq!(ignored.status, MatchStatus::Ignored);
        assert!(f.service.get_unmatched_transactions(f.building.id).await.unwrap().is_empty());

        let err = f.service.ignore_transaction(tx.id).await.unwrap_err();
        assert!(matches!(
            err,
            ReconciliationError::InvalidTransition {
                from: MatchStatus::Ignored,
                to: MatchStatus::Ignored
            }
        ));
    }

    #[tokio::test]
    async fn test_unknown_building_is_not_found() {
        let f = fixture().await;
        let err = f
            .service
            .get_unmatched_transactions(BuildingId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ReconciliationError::NotFound { .. }));
    }
}
