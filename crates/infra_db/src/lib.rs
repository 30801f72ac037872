//! Infrastructure Database Layer
//!
//! PostgreSQL adapters for the domain ports, built on SQLx.
//!
//! # Architecture
//!
//! The crate follows the repository pattern: each `Pg*Repository` implements
//! one domain port and hides the schema from the domain layer. Amounts are
//! stored as integer minor units next to an ISO 4217 currency column, and
//! every conditional write a port documents (status guards, permillage
//! totals, claim of a bank transaction) happens in a single statement or a
//! transaction holding a row lock.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, DatabaseConfig, PgBuildingRepository};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/condo")).await?;
//! let buildings = PgBuildingRepository::new(pool.clone());
//! ```

pub mod pool;
pub mod error;
pub mod repositories;

pub use pool::{check_health, create_pool, run_migrations, DatabaseConfig, DatabasePool};
pub use error::DatabaseError;
pub use repositories::{
    PgBankingRepository, PgBuildingRepository, PgPaymentLedgerRepository, PgProjectRepository,
};
