//! Payment Ledger Domain
//!
//! One ledger row per (apartment, month, year) records the status of the
//! recurring monthly quota. Rows are created lazily by the first status write
//! and every write is a single atomic insert-or-update keyed by that natural
//! key, so concurrent writers never produce two rows for the same month.
//!
//! # Status machine
//!
//! ```text
//!   pending ──► paid | late | partial
//!   late    ──► paid | partial | pending
//!   paid    ──► pending | partial
//!   partial ──► paid | late | pending
//!   any     ──► itself
//! ```
//!
//! The same machine governs extraordinary-project installments.

pub mod status;
pub mod payment;
pub mod error;
pub mod ports;
pub mod service;
pub mod reporting;

pub use status::PaymentStatus;
pub use payment::{LedgerWrite, RecurringPayment};
pub use error::LedgerError;
pub use ports::PaymentLedgerPort;
#[cfg(any(test, feature = "mock"))]
pub use ports::mock::MockPaymentLedgerPort;
#[cfg(any(test, feature = "mock"))]
pub use reporting::mock::StaticExtraordinaryLedger;
pub use service::{BulkFailure, BulkUpdateReport, LedgerService};
pub use reporting::{
    ApartmentPaymentRow, BuildingStats, ExtraordinaryLedger, InstallmentAmounts, MonthEntry,
    PaymentMap, ReportingService,
};
