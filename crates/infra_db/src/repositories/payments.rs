//! Recurring payment ledger

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

use core_kernel::{
    ApartmentId, BillingPeriod, DomainPort, HealthCheckResult, HealthCheckable, PaymentId,
    PortError,
};
use domain_payments::{LedgerWrite, PaymentLedgerPort, PaymentStatus, RecurringPayment};

use super::{money, names, parse, period};
use crate::error::DatabaseError;
use crate::pool::check_health;

const PAYMENT_COLUMNS: &str = "payment_id, apartment_id, year, month, status, amount_cents, currency, updated_at";

#[derive(Debug, FromRow)]
struct PaymentRow {
    payment_id: Uuid,
    apartment_id: Uuid,
    year: i32,
    month: i32,
    status: String,
    amount_cents: i64,
    currency: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for RecurringPayment {
    type Error = DatabaseError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(RecurringPayment {
            id: PaymentId::from(row.payment_id),
            apartment_id: ApartmentId::from(row.apartment_id),
            period: period(row.year, row.month)?,
            status: parse(&row.status)?,
            amount: money(row.amount_cents, &row.currency)?,
            updated_at: row.updated_at,
        })
    }
}

/// Postgres implementation of [`PaymentLedgerPort`]
#[derive(Debug, Clone)]
pub struct PgPaymentLedgerRepository {
    pool: PgPool,
}

impl PgPaymentLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PgPaymentLedgerRepository {}

#[async_trait]
impl HealthCheckable for PgPaymentLedgerRepository {
    async fn health_check(&self) -> HealthCheckResult {
        check_health(&self.pool, "postgres-payment-ledger").await
    }
}

#[async_trait]
impl PaymentLedgerPort for PgPaymentLedgerRepository {
    /// A single upsert whose update arm only fires when the stored status is
    /// in `allowed_from`; no row back means the guard refused the write.
    #[instrument(skip(self, write), fields(apartment_id = %write.apartment_id, period = %write.period))]
    async fn upsert_status(
        &self,
        write: LedgerWrite,
        allowed_from: &[PaymentStatus],
    ) -> Result<RecurringPayment, PortError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            INSERT INTO recurring_payments ({PAYMENT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, now())
            ON CONFLICT (apartment_id, year, month) DO UPDATE
            SET status = EXCLUDED.status,
                amount_cents = EXCLUDED.amount_cents,
                currency = EXCLUDED.currency,
                updated_at = now()
            WHERE recurring_payments.status = ANY($8)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(Uuid::from(PaymentId::new_v7()))
        .bind(Uuid::from(write.apartment_id))
        .bind(write.period.year())
        .bind(write.period.month() as i32)
        .bind(write.status.as_str())
        .bind(write.amount.minor())
        .bind(write.amount.currency().code())
        .bind(names(allowed_from, PaymentStatus::as_str))
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        match row {
            Some(row) => Ok(RecurringPayment::try_from(row)?),
            None => Err(PortError::conflict(format!(
                "payment for {} is not in an updatable status",
                write.period
            ))),
        }
    }

    async fn get_payment(
        &self,
        apartment_id: ApartmentId,
        period: BillingPeriod,
    ) -> Result<Option<RecurringPayment>, PortError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM recurring_payments WHERE apartment_id = $1 AND year = $2 AND month = $3"
        ))
        .bind(Uuid::from(apartment_id))
        .bind(period.year())
        .bind(period.month() as i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        Ok(row.map(RecurringPayment::try_from).transpose()?)
    }

    async fn list_for_apartments(
        &self,
        apartment_ids: &[ApartmentId],
        year: i32,
    ) -> Result<Vec<RecurringPayment>, PortError> {
        let ids: Vec<Uuid> = apartment_ids.iter().map(|id| Uuid::from(*id)).collect();
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM recurring_payments
            WHERE apartment_id = ANY($1) AND year = $2
            ORDER BY month, apartment_id
            "#
        ))
        .bind(ids)
        .bind(year)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        rows.into_iter()
            .map(|row| RecurringPayment::try_from(row).map_err(PortError::from))
            .collect()
    }
}
