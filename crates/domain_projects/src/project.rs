//! Projects and installments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{
    ApartmentId, BillingPeriod, BuildingId, InstallmentId, Money, Permillage, ProjectId,
};
use domain_building::Apartment;
use domain_payments::PaymentStatus;

/// Lifecycle status of an extraordinary project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Completed,
    Cancelled,
    /// Terminal and read-only
    Archived,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Cancelled => "cancelled",
            ProjectStatus::Archived => "archived",
        }
    }

    pub fn can_transition_to(&self, target: ProjectStatus) -> bool {
        use ProjectStatus::*;
        matches!(
            (self, target),
            (Active, Completed | Cancelled | Archived)
                | (Completed, Archived | Active)
                | (Cancelled, Archived)
        )
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ProjectStatus::Active),
            "completed" => Ok(ProjectStatus::Completed),
            "cancelled" => Ok(ProjectStatus::Cancelled),
            "archived" => Ok(ProjectStatus::Archived),
            other => Err(format!("unknown project status: {}", other)),
        }
    }
}

/// A one-time capital expense shared by the building's apartments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraordinaryProject {
    pub id: ProjectId,
    pub building_id: BuildingId,
    pub name: String,
    pub description: Option<String>,
    pub total_budget: Money,
    pub num_installments: u32,
    /// Due period of the first installment
    pub start: BillingPeriod,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExtraordinaryProject {
    pub fn is_archived(&self) -> bool {
        self.status == ProjectStatus::Archived
    }
}

/// An apartment's unit and weight, copied at project creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApartmentShare {
    pub apartment_id: ApartmentId,
    pub unit: String,
    pub permillage: Permillage,
}

impl From<&Apartment> for ApartmentShare {
    fn from(apartment: &Apartment) -> Self {
        Self {
            apartment_id: apartment.id,
            unit: apartment.unit.clone(),
            permillage: apartment.permillage,
        }
    }
}

/// One apartment's share of one installment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    pub id: InstallmentId,
    pub project_id: ProjectId,
    pub apartment_id: ApartmentId,
    pub unit: String,
    pub permillage: Permillage,
    /// 1-based
    pub installment_number: u32,
    pub due: BillingPeriod,
    pub expected_amount: Money,
    pub paid_amount: Money,
    pub status: PaymentStatus,
    pub updated_at: DateTime<Utc>,
}
