//! Unit tests for the Identifiers module
//!
//! Tests cover creation, parsing with and without prefixes, conversion,
//! and display formatting.

use core_kernel::{
    ApartmentId, BankTransactionId, BuildingId, InstallmentId, PaymentId, ProjectId,
    ResidentIbanId, ResidentId, UserId,
};
use uuid::Uuid;

mod creation {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        assert_ne!(BuildingId::new(), BuildingId::new());
    }

    #[test]
    fn test_new_v7_generates_time_ordered_ids() {
        let id1 = ProjectId::new_v7();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let id2 = ProjectId::new_v7();
        assert!(id1 < id2);
    }

    #[test]
    fn test_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = ApartmentId::from_uuid(uuid);
        assert_eq!(*id.as_uuid(), uuid);
    }
}

mod display_and_parse {
    use super::*;

    #[test]
    fn test_prefixes() {
        assert_eq!(BuildingId::prefix(), "BLD");
        assert_eq!(ApartmentId::prefix(), "APT");
        assert_eq!(ResidentId::prefix(), "RSD");
        assert_eq!(UserId::prefix(), "USR");
        assert_eq!(ResidentIbanId::prefix(), "IBN");
        assert_eq!(PaymentId::prefix(), "PAY");
        assert_eq!(ProjectId::prefix(), "PRJ");
        assert_eq!(InstallmentId::prefix(), "INS");
        assert_eq!(BankTransactionId::prefix(), "BTX");
    }

    #[test]
    fn test_display_includes_prefix() {
        let id = InstallmentId::new();
        assert!(id.to_string().starts_with("INS-"));
    }

    #[test]
    fn test_parse_with_prefix() {
        let id = BankTransactionId::new();
        let parsed: BankTransactionId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_parse_bare_uuid() {
        let uuid = Uuid::new_v4();
        let parsed: ResidentId = uuid.to_string().parse().unwrap();
        assert_eq!(*parsed.as_uuid(), uuid);
    }

    #[test]
    fn test_parse_invalid_fails() {
        assert!("BLD-not-a-uuid".parse::<BuildingId>().is_err());
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = PaymentId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));
    }
}
