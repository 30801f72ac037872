//! Test Utilities Crate
//!
//! Shared test infrastructure, fixtures, and helpers for the condominium
//! test suite.
//!
//! # Modules
//!
//! - `fixtures`: Fixed values for money, periods, IBANs and permillage splits
//! - `builders`: Builder patterns for buildings and bank transactions
//! - `world`: Every port as an in-memory mock, with service constructors
//! - `database`: Testcontainers PostgreSQL for repository tests
//! - `assertions`: Custom assertion helpers for domain types
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod world;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use world::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
