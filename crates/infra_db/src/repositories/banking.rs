//! Imported bank transactions

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{
    ApartmentId, BankTransactionId, BuildingId, DomainPort, HealthCheckResult, HealthCheckable,
    InstallmentId, PortError,
};
use domain_banking::{BankTransaction, BankingPort, MatchStatus, ObligationRef};

use super::{money, names, parse, period};
use crate::error::DatabaseError;
use crate::pool::check_health;

const TRANSACTION_COLUMNS: [&str; 17] = [
    "transaction_id",
    "building_id",
    "external_id",
    "account_id",
    "amount_cents",
    "currency",
    "counterpart_iban",
    "counterpart_name",
    "booking_date",
    "description",
    "status",
    "matched_apartment_id",
    "matched_year",
    "matched_month",
    "matched_installment_id",
    "matched_at",
    "created_at",
];

/// Column list, optionally qualified with a table alias
fn columns(alias: Option<&str>) -> String {
    TRANSACTION_COLUMNS
        .iter()
        .map(|c| match alias {
            Some(alias) => format!("{}.{}", alias, c),
            None => (*c).to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, FromRow)]
struct TransactionRow {
    transaction_id: Uuid,
    building_id: Uuid,
    external_id: String,
    account_id: String,
    amount_cents: i64,
    currency: String,
    counterpart_iban: Option<String>,
    counterpart_name: Option<String>,
    booking_date: NaiveDate,
    description: Option<String>,
    status: String,
    matched_apartment_id: Option<Uuid>,
    matched_year: Option<i32>,
    matched_month: Option<i32>,
    matched_installment_id: Option<Uuid>,
    matched_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TransactionRow {
    fn obligation(&self) -> Result<Option<ObligationRef>, DatabaseError> {
        match (
            self.matched_apartment_id,
            self.matched_year,
            self.matched_month,
            self.matched_installment_id,
        ) {
            (None, None, None, None) => Ok(None),
            (Some(apartment_id), Some(year), Some(month), None) => Ok(Some(ObligationRef::Recurring {
                apartment_id: ApartmentId::from(apartment_id),
                period: period(year, month)?,
            })),
            (None, None, None, Some(installment_id)) => Ok(Some(ObligationRef::Installment {
                installment_id: InstallmentId::from(installment_id),
            })),
            _ => Err(DatabaseError::corrupt(format!(
                "transaction {} has a partial obligation link",
                self.transaction_id
            ))),
        }
    }
}

impl TryFrom<TransactionRow> for BankTransaction {
    type Error = DatabaseError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let matched_obligation = row.obligation()?;
        Ok(BankTransaction {
            id: BankTransactionId::from(row.transaction_id),
            building_id: BuildingId::from(row.building_id),
            external_id: row.external_id,
            account_id: row.account_id,
            amount: money(row.amount_cents, &row.currency)?,
            counterpart_iban: row.counterpart_iban,
            counterpart_name: row.counterpart_name,
            booking_date: row.booking_date,
            description: row.description,
            status: parse(&row.status)?,
            matched_obligation,
            matched_at: row.matched_at,
            created_at: row.created_at,
        })
    }
}

/// Obligation link as stored: (apartment, year, month, installment)
type LinkColumns = (Option<Uuid>, Option<i32>, Option<i32>, Option<Uuid>);

fn link_columns(obligation: Option<ObligationRef>) -> LinkColumns {
    match obligation {
        None => (None, None, None, None),
        Some(ObligationRef::Recurring {
            apartment_id,
            period,
        }) => (
            Some(Uuid::from(apartment_id)),
            Some(period.year()),
            Some(period.month() as i32),
            None,
        ),
        Some(ObligationRef::Installment { installment_id }) => {
            (None, None, None, Some(Uuid::from(installment_id)))
        }
    }
}

/// Postgres implementation of [`BankingPort`]
#[derive(Debug, Clone)]
pub struct PgBankingRepository {
    pool: PgPool,
}

impl PgBankingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Explains why a conditional write touched no row
    async fn refused(&self, id: BankTransactionId) -> PortError {
        match self.get_transaction(id).await {
            Ok(current) => PortError::conflict(format!("transaction is {}", current.status)),
            Err(e) => e,
        }
    }
}

impl DomainPort for PgBankingRepository {}

#[async_trait]
impl HealthCheckable for PgBankingRepository {
    async fn health_check(&self) -> HealthCheckResult {
        check_health(&self.pool, "postgres-banking-repository").await
    }
}

#[async_trait]
impl BankingPort for PgBankingRepository {
    #[instrument(skip(self, transaction), fields(external_id = %transaction.external_id))]
    async fn insert_if_absent(&self, transaction: BankTransaction) -> Result<bool, PortError> {
        let (apartment_id, year, month, installment_id) = link_columns(transaction.matched_obligation);
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO bank_transactions ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (building_id, external_id) DO NOTHING
            "#,
            columns(None)
        ))
        .bind(Uuid::from(transaction.id))
        .bind(Uuid::from(transaction.building_id))
        .bind(&transaction.external_id)
        .bind(&transaction.account_id)
        .bind(transaction.amount.minor())
        .bind(transaction.amount.currency().code())
        .bind(&transaction.counterpart_iban)
        .bind(&transaction.counterpart_name)
        .bind(transaction.booking_date)
        .bind(&transaction.description)
        .bind(transaction.status.as_str())
        .bind(apartment_id)
        .bind(year)
        .bind(month)
        .bind(installment_id)
        .bind(transaction.matched_at)
        .bind(transaction.created_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        let inserted = result.rows_affected() == 1;
        if !inserted {
            debug!("transaction already imported");
        }
        Ok(inserted)
    }

    async fn get_transaction(&self, id: BankTransactionId) -> Result<BankTransaction, PortError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM bank_transactions WHERE transaction_id = $1",
            columns(None)
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?
        .ok_or_else(|| DatabaseError::not_found("BankTransaction", id))?;
        Ok(BankTransaction::try_from(row)?)
    }

    async fn list_unmatched(&self, building_id: BuildingId) -> Result<Vec<BankTransaction>, PortError> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            SELECT {} FROM bank_transactions
            WHERE building_id = $1 AND status = 'unmatched'
            ORDER BY booking_date, external_id
            "#,
            columns(None)
        ))
        .bind(Uuid::from(building_id))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        rows.into_iter()
            .map(|row| BankTransaction::try_from(row).map_err(PortError::from))
            .collect()
    }

    /// The locked pre-image is returned from the CTE, so the caller gets the
    /// row exactly as it was before this statement changed it.
    #[instrument(skip(self, allowed_from))]
    async fn claim(
        &self,
        id: BankTransactionId,
        obligation: ObligationRef,
        allowed_from: &[MatchStatus],
    ) -> Result<BankTransaction, PortError> {
        let (apartment_id, year, month, installment_id) = link_columns(Some(obligation));
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            WITH previous AS (
                SELECT {all} FROM bank_transactions
                WHERE transaction_id = $1 AND status = ANY($6)
                FOR UPDATE
            )
            UPDATE bank_transactions t
            SET status = 'matched',
                matched_apartment_id = $2,
                matched_year = $3,
                matched_month = $4,
                matched_installment_id = $5,
                matched_at = now()
            FROM previous
            WHERE t.transaction_id = previous.transaction_id
            RETURNING {previous}
            "#,
            all = columns(None),
            previous = columns(Some("previous")),
        ))
        .bind(Uuid::from(id))
        .bind(apartment_id)
        .bind(year)
        .bind(month)
        .bind(installment_id)
        .bind(names(allowed_from, MatchStatus::as_str))
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        match row {
            Some(row) => Ok(BankTransaction::try_from(row)?),
            None => Err(self.refused(id).await),
        }
    }

    async fn restore(&self, previous: &BankTransaction) -> Result<(), PortError> {
        let (apartment_id, year, month, installment_id) = link_columns(previous.matched_obligation);
        let result = sqlx::query(
            r#"
            UPDATE bank_transactions
            SET status = $2,
                matched_apartment_id = $3,
                matched_year = $4,
                matched_month = $5,
                matched_installment_id = $6,
                matched_at = $7
            WHERE transaction_id = $1
            "#,
        )
        .bind(Uuid::from(previous.id))
        .bind(previous.status.as_str())
        .bind(apartment_id)
        .bind(year)
        .bind(month)
        .bind(installment_id)
        .bind(previous.matched_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("BankTransaction", previous.id).into());
        }
        Ok(())
    }

    async fn ignore(&self, id: BankTransactionId) -> Result<BankTransaction, PortError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE bank_transactions SET status = 'ignored'
            WHERE transaction_id = $1 AND status = 'unmatched'
            RETURNING {}
            "#,
            columns(None)
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        match row {
            Some(row) => Ok(BankTransaction::try_from(row)?),
            None => Err(self.refused(id).await),
        }
    }
}
