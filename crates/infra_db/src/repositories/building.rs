//! Buildings, apartments and resident IBANs
//!
//! Apartment writes lock the owning building row first, so the permillage
//! total checked after the write cannot be changed by a concurrent writer
//! before the transaction commits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{
    ApartmentId, BuildingId, DomainPort, HealthCheckResult, HealthCheckable, Permillage,
    PortError, ResidentIbanId, ResidentId,
};
use domain_building::{Apartment, Building, BuildingPort, BuildingStatus, Iban, ResidentIban};

use super::{money, parse};
use crate::error::DatabaseError;
use crate::pool::check_health;

const BUILDING_COLUMNS: &str =
    "building_id, name, address, monthly_quota_cents, currency, status, created_at, updated_at";
const APARTMENT_COLUMNS: &str =
    "apartment_id, building_id, unit, permillage, resident_id, created_at, updated_at";

#[derive(Debug, FromRow)]
struct BuildingRow {
    building_id: Uuid,
    name: String,
    address: Option<String>,
    monthly_quota_cents: i64,
    currency: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BuildingRow> for Building {
    type Error = DatabaseError;

    fn try_from(row: BuildingRow) -> Result<Self, Self::Error> {
        Ok(Building {
            id: BuildingId::from(row.building_id),
            name: row.name,
            address: row.address,
            monthly_quota: money(row.monthly_quota_cents, &row.currency)?,
            status: parse(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ApartmentRow {
    apartment_id: Uuid,
    building_id: Uuid,
    unit: String,
    permillage: i32,
    resident_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ApartmentRow> for Apartment {
    type Error = DatabaseError;

    fn try_from(row: ApartmentRow) -> Result<Self, Self::Error> {
        let permillage = u32::try_from(row.permillage)
            .ok()
            .and_then(|p| Permillage::new(p).ok())
            .ok_or_else(|| DatabaseError::corrupt(format!("permillage {}", row.permillage)))?;
        Ok(Apartment {
            id: ApartmentId::from(row.apartment_id),
            building_id: BuildingId::from(row.building_id),
            unit: row.unit,
            permillage,
            resident_id: row.resident_id.map(ResidentId::from),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ResidentIbanRow {
    iban_id: Uuid,
    apartment_id: Uuid,
    label: String,
    iban: String,
    is_primary: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<ResidentIbanRow> for ResidentIban {
    type Error = DatabaseError;

    fn try_from(row: ResidentIbanRow) -> Result<Self, Self::Error> {
        Ok(ResidentIban {
            id: ResidentIbanId::from(row.iban_id),
            apartment_id: ApartmentId::from(row.apartment_id),
            label: row.label,
            iban: Iban::try_from(row.iban).map_err(|e| DatabaseError::corrupt(e.to_string()))?,
            is_primary: row.is_primary,
            created_at: row.created_at,
        })
    }
}

/// Postgres implementation of [`BuildingPort`]
#[derive(Debug, Clone)]
pub struct PgBuildingRepository {
    pool: PgPool,
}

impl PgBuildingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Locks the building row and returns its status
    async fn lock_building(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<BuildingStatus, DatabaseError> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM buildings WHERE building_id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut **tx)
                .await?;
        match status {
            Some(status) => parse(&status),
            None => Err(DatabaseError::not_found("Building", BuildingId::from(id))),
        }
    }

    async fn permillage_total(
        tx: &mut Transaction<'_, Postgres>,
        building_id: Uuid,
    ) -> Result<u32, DatabaseError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(permillage), 0)::BIGINT FROM apartments WHERE building_id = $1",
        )
        .bind(building_id)
        .fetch_one(&mut **tx)
        .await?;
        u32::try_from(total).map_err(|_| DatabaseError::corrupt(format!("permillage total {}", total)))
    }

    /// Rejects apartment changes the building's status does not allow
    async fn check_apartment_change(
        tx: &mut Transaction<'_, Postgres>,
        building_id: Uuid,
        status: BuildingStatus,
    ) -> Result<(), PortError> {
        match status {
            BuildingStatus::Archived => Err(PortError::conflict("building is archived")),
            BuildingStatus::Active => {
                let total = Self::permillage_total(tx, building_id).await?;
                if total != Permillage::WHOLE {
                    return Err(PortError::validation_field(
                        format!("permillage would total {}, expected {}", total, Permillage::WHOLE),
                        "permillage",
                    ));
                }
                Ok(())
            }
            BuildingStatus::Setup => Ok(()),
        }
    }
}

impl DomainPort for PgBuildingRepository {}

#[async_trait]
impl HealthCheckable for PgBuildingRepository {
    async fn health_check(&self) -> HealthCheckResult {
        check_health(&self.pool, "postgres-building-repository").await
    }
}

#[async_trait]
impl BuildingPort for PgBuildingRepository {
    #[instrument(skip(self, building), fields(building_id = %building.id))]
    async fn create_building(&self, building: Building) -> Result<Building, PortError> {
        let row = sqlx::query_as::<_, BuildingRow>(&format!(
            r#"
            INSERT INTO buildings ({BUILDING_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {BUILDING_COLUMNS}
            "#
        ))
        .bind(Uuid::from(building.id))
        .bind(&building.name)
        .bind(&building.address)
        .bind(building.monthly_quota.minor())
        .bind(building.monthly_quota.currency().code())
        .bind(building.status.as_str())
        .bind(building.created_at)
        .bind(building.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        Ok(Building::try_from(row)?)
    }

    async fn get_building(&self, id: BuildingId) -> Result<Building, PortError> {
        let row = sqlx::query_as::<_, BuildingRow>(&format!(
            "SELECT {BUILDING_COLUMNS} FROM buildings WHERE building_id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?
        .ok_or_else(|| DatabaseError::not_found("Building", id))?;
        Ok(Building::try_from(row)?)
    }

    #[instrument(skip(self))]
    async fn transition_building(
        &self,
        id: BuildingId,
        from: BuildingStatus,
        to: BuildingStatus,
    ) -> Result<Building, PortError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;
        let current = Self::lock_building(&mut tx, Uuid::from(id)).await?;
        if current != from {
            return Err(PortError::conflict(format!("building is {}, expected {}", current, from)));
        }
        if to == BuildingStatus::Active {
            let total = Self::permillage_total(&mut tx, Uuid::from(id)).await?;
            if total != Permillage::WHOLE {
                return Err(PortError::validation_field(
                    format!("permillage totals {}, expected {}", total, Permillage::WHOLE),
                    "permillage",
                ));
            }
        }

        let row = sqlx::query_as::<_, BuildingRow>(&format!(
            r#"
            UPDATE buildings SET status = $2, updated_at = now()
            WHERE building_id = $1
            RETURNING {BUILDING_COLUMNS}
            "#
        ))
        .bind(Uuid::from(id))
        .bind(to.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from)?;
        tx.commit().await.map_err(DatabaseError::from)?;
        debug!(from = %from, to = %to, "building status changed");
        Ok(Building::try_from(row)?)
    }

    async fn list_apartments(&self, building_id: BuildingId) -> Result<Vec<Apartment>, PortError> {
        let rows = sqlx::query_as::<_, ApartmentRow>(&format!(
            "SELECT {APARTMENT_COLUMNS} FROM apartments WHERE building_id = $1 ORDER BY unit"
        ))
        .bind(Uuid::from(building_id))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        rows.into_iter()
            .map(|row| Apartment::try_from(row).map_err(PortError::from))
            .collect()
    }

    async fn get_apartment(&self, id: ApartmentId) -> Result<Apartment, PortError> {
        let row = sqlx::query_as::<_, ApartmentRow>(&format!(
            "SELECT {APARTMENT_COLUMNS} FROM apartments WHERE apartment_id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?
        .ok_or_else(|| DatabaseError::not_found("Apartment", id))?;
        Ok(Apartment::try_from(row)?)
    }

    async fn apartments_for_resident(&self, resident_id: ResidentId) -> Result<Vec<Apartment>, PortError> {
        let rows = sqlx::query_as::<_, ApartmentRow>(&format!(
            "SELECT {APARTMENT_COLUMNS} FROM apartments WHERE resident_id = $1 ORDER BY unit"
        ))
        .bind(Uuid::from(resident_id))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        rows.into_iter()
            .map(|row| Apartment::try_from(row).map_err(PortError::from))
            .collect()
    }

    #[instrument(skip(self, apartment), fields(apartment_id = %apartment.id))]
    async fn save_apartment(&self, apartment: Apartment) -> Result<Apartment, PortError> {
        let building_id = Uuid::from(apartment.building_id);
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;
        let status = Self::lock_building(&mut tx, building_id).await?;
        if status == BuildingStatus::Archived {
            return Err(PortError::conflict("building is archived"));
        }

        let row = sqlx::query_as::<_, ApartmentRow>(&format!(
            r#"
            INSERT INTO apartments ({APARTMENT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, now())
            ON CONFLICT (apartment_id) DO UPDATE
            SET unit = EXCLUDED.unit,
                permillage = EXCLUDED.permillage,
                resident_id = EXCLUDED.resident_id,
                updated_at = now()
            RETURNING {APARTMENT_COLUMNS}
            "#
        ))
        .bind(Uuid::from(apartment.id))
        .bind(building_id)
        .bind(&apartment.unit)
        .bind(apartment.permillage.value() as i32)
        .bind(apartment.resident_id.map(Uuid::from))
        .bind(apartment.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from)?;

        Self::check_apartment_change(&mut tx, building_id, status).await?;
        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(Apartment::try_from(row)?)
    }

    #[instrument(skip(self))]
    async fn remove_apartment(&self, id: ApartmentId) -> Result<(), PortError> {
        let apartment = self.get_apartment(id).await?;
        let building_id = Uuid::from(apartment.building_id);
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;
        let status = Self::lock_building(&mut tx, building_id).await?;

        let deleted = sqlx::query("DELETE FROM apartments WHERE apartment_id = $1")
            .bind(Uuid::from(id))
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from)?;
        if deleted.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Apartment", id).into());
        }

        Self::check_apartment_change(&mut tx, building_id, status).await?;
        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(())
    }

    async fn list_resident_ibans(&self, building_id: BuildingId) -> Result<Vec<ResidentIban>, PortError> {
        let rows = sqlx::query_as::<_, ResidentIbanRow>(
            r#"
            SELECT r.iban_id, r.apartment_id, r.label, r.iban, r.is_primary, r.created_at
            FROM resident_ibans r
            JOIN apartments a ON a.apartment_id = r.apartment_id
            WHERE a.building_id = $1
            ORDER BY r.created_at
            "#,
        )
        .bind(Uuid::from(building_id))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        rows.into_iter()
            .map(|row| ResidentIban::try_from(row).map_err(PortError::from))
            .collect()
    }

    #[instrument(skip(self, iban), fields(apartment_id = %iban.apartment_id))]
    async fn add_resident_iban(&self, iban: ResidentIban) -> Result<ResidentIban, PortError> {
        let apartment_id = Uuid::from(iban.apartment_id);
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;

        let exists: Option<Uuid> = sqlx::query_scalar(
            "SELECT apartment_id FROM apartments WHERE apartment_id = $1 FOR UPDATE",
        )
        .bind(apartment_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DatabaseError::from)?;
        if exists.is_none() {
            return Err(DatabaseError::not_found("Apartment", iban.apartment_id).into());
        }

        let registered: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM resident_ibans WHERE apartment_id = $1")
                .bind(apartment_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(DatabaseError::from)?;
        let is_primary = iban.is_primary || registered == 0;
        if is_primary {
            sqlx::query("UPDATE resident_ibans SET is_primary = FALSE WHERE apartment_id = $1")
                .bind(apartment_id)
                .execute(&mut *tx)
                .await
                .map_err(DatabaseError::from)?;
        }

        let row = sqlx::query_as::<_, ResidentIbanRow>(
            r#"
            INSERT INTO resident_ibans (iban_id, apartment_id, label, iban, is_primary, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING iban_id, apartment_id, label, iban, is_primary, created_at
            "#,
        )
        .bind(Uuid::from(iban.id))
        .bind(apartment_id)
        .bind(&iban.label)
        .bind(iban.iban.as_str())
        .bind(is_primary)
        .bind(iban.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from)?;
        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(ResidentIban::try_from(row)?)
    }

    async fn remove_resident_iban(&self, id: ResidentIbanId) -> Result<(), PortError> {
        let deleted = sqlx::query("DELETE FROM resident_ibans WHERE iban_id = $1")
            .bind(Uuid::from(id))
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        if deleted.rows_affected() == 0 {
            return Err(DatabaseError::not_found("ResidentIban", id).into());
        }
        Ok(())
    }
}
