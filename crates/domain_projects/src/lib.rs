//! Extraordinary Projects Domain
//!
//! A project is a one-time capital expense paid in installments. At creation
//! the budget is split evenly across installments and each installment is
//! split across apartments by permillage, both with the largest-remainder
//! method, so every cent of the budget is owed by exactly one row.
//!
//! Installment rows carry a copy of the apartment's unit and permillage taken
//! when the project was created. Later changes to the building never alter
//! an existing schedule.

pub mod project;
pub mod allocator;
pub mod error;
pub mod ports;
pub mod service;
pub mod ledger_view;

pub use project::{ApartmentShare, ExtraordinaryProject, Installment, ProjectStatus};
pub use allocator::build_schedule;
pub use error::ProjectError;
pub use ports::{ProjectPatch, ProjectPort};
#[cfg(any(test, feature = "mock"))]
pub use ports::mock::MockProjectPort;
pub use service::{
    CreateProject, ProjectService, ProjectSummary, ResidentProjectPayments, MAX_INSTALLMENTS,
};
pub use ledger_view::InstallmentLedgerView;
