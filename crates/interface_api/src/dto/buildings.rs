//! Building, apartment and IBAN DTOs

use core_kernel::ResidentId;
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBuildingRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    /// Monthly quota per apartment, in cents
    #[validate(range(min = 0))]
    pub monthly_quota_cents: i64,
    /// ISO 4217 code
    #[validate(length(equal = 3))]
    pub currency: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddApartmentRequest {
    #[validate(length(min = 1, max = 20))]
    pub unit: String,
    #[validate(range(max = 1000))]
    pub permillage: u32,
    pub resident_id: Option<ResidentId>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddIbanRequest {
    #[validate(length(min = 1, max = 100))]
    pub label: String,
    /// Spaces and lower case are accepted
    #[validate(length(min = 15, max = 42))]
    pub iban: String,
    #[serde(default)]
    pub is_primary: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_building_rejects_bad_currency() {
        let request: CreateBuildingRequest = serde_json::from_str(
            r#"{"name":"Sol","monthly_quota_cents":5000,"currency":"EURO"}"#,
        )
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_iban_primary_defaults_to_false() {
        let request: AddIbanRequest =
            serde_json::from_str(r#"{"label":"main","iban":"DE89 3704 0044 0532 0130 00"}"#).unwrap();
        assert!(!request.is_primary);
        assert!(request.validate().is_ok());
    }
}
