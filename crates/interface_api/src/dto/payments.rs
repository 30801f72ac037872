//! Ledger and reporting DTOs

use domain_payments::PaymentStatus;
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePaymentRequest {
    pub status: PaymentStatus,
    /// Cents; defaults depend on the status
    #[validate(range(min = 0))]
    pub amount_cents: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BulkUpdateRequest {
    pub year: i32,
    #[validate(range(min = 1, max = 12))]
    pub start_month: u32,
    #[validate(range(min = 1, max = 12))]
    pub end_month: u32,
    pub status: PaymentStatus,
}

#[derive(Debug, Deserialize)]
pub struct YearQuery {
    pub year: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StatsQuery {
    pub year: i32,
    #[validate(range(min = 1, max = 12))]
    pub month: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_uses_snake_case() {
        let request: UpdatePaymentRequest =
            serde_json::from_str(r#"{"status":"partial","amount_cents":1200}"#).unwrap();
        assert_eq!(request.status, PaymentStatus::Partial);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_bulk_month_out_of_range() {
        let request = BulkUpdateRequest {
            year: 2024,
            start_month: 0,
            end_month: 13,
            status: PaymentStatus::Paid,
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("start_month"));
        assert!(fields.contains_key("end_month"));
    }
}
