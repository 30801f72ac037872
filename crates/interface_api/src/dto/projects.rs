//! Extraordinary project DTOs

use domain_payments::PaymentStatus;
use domain_projects::{ProjectPatch, ProjectStatus};
use serde::Deserialize;
use validator::Validate;

use super::double_option;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    /// Cents, in the building's currency
    #[validate(range(min = 1))]
    pub total_budget_cents: i64,
    #[validate(range(min = 1, max = 120))]
    pub num_installments: u32,
    #[validate(range(min = 1, max = 12))]
    pub start_month: u32,
    pub start_year: i32,
}

/// Absent fields are left untouched; `"description": null` clears it
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub status: Option<ProjectStatus>,
}

impl From<UpdateProjectRequest> for ProjectPatch {
    fn from(request: UpdateProjectRequest) -> Self {
        ProjectPatch {
            name: request.name,
            description: request.description,
            status: request.status,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateInstallmentRequest {
    pub status: PaymentStatus,
    #[validate(range(min = 0))]
    pub paid_amount_cents: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_projects::MAX_INSTALLMENTS;

    #[test]
    fn test_null_description_clears() {
        let request: UpdateProjectRequest = serde_json::from_str(r#"{"description":null}"#).unwrap();
        assert_eq!(request.description, Some(None));

        let request: UpdateProjectRequest = serde_json::from_str(r#"{"name":"Roof"}"#).unwrap();
        assert_eq!(request.description, None);
        assert_eq!(request.name.as_deref(), Some("Roof"));
    }

    #[test]
    fn test_installment_count_is_bounded() {
        let request = CreateProjectRequest {
            name: "Lift".to_string(),
            description: None,
            total_budget_cents: 100_000,
            num_installments: MAX_INSTALLMENTS + 1,
            start_month: 1,
            start_year: 2024,
        };
        assert!(request.validate().is_err());
    }
}
