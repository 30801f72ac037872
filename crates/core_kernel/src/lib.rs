//! Core Kernel - Foundational types for the condominium management core
//!
//! This crate provides the building blocks shared by every domain crate:
//! - Money in integer minor units with exact share allocation
//! - Billing periods (month/year) used as ledger keys
//! - Strongly-typed identifiers
//! - Port infrastructure for swappable adapters (database, bank API, notifications)

pub mod money;
pub mod period;
pub mod identifiers;
pub mod ports;
pub mod notify;

pub use money::{allocate_shares, Money, Currency, MoneyError, Percentage, Permillage};
pub use period::{BillingPeriod, PeriodError, validate_month_range};
pub use identifiers::{
    BuildingId, ApartmentId, ResidentId, UserId, ResidentIbanId,
    PaymentId, ProjectId, InstallmentId, BankTransactionId,
};
pub use ports::{
    PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth,
    CircuitBreakerConfig,
};
pub use notify::{Notification, Recipient, Notifier, TracingNotifier, dispatch};
