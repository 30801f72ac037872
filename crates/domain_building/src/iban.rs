//! Resident IBANs
//!
//! An IBAN is stored in its electronic form: no whitespace, uppercase. The
//! same normalization is applied to counterpart IBANs of bank transactions so
//! the two can be compared as plain strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{ApartmentId, ResidentIbanId};

use crate::error::BuildingError;

const MIN_LEN: usize = 15;
const MAX_LEN: usize = 34;

/// A validated, normalized International Bank Account Number
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Iban(String);

impl Iban {
    /// Strips whitespace and uppercases, without validating
    pub fn normalize(raw: &str) -> String {
        raw.chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect()
    }

    /// Normalizes and validates an IBAN, including its mod-97 check digits
    pub fn parse(raw: &str) -> Result<Self, BuildingError> {
        let iban = Self::normalize(raw);
        if iban.len() < MIN_LEN || iban.len() > MAX_LEN {
            return Err(BuildingError::InvalidIban(format!(
                "length {} outside {}-{}",
                iban.len(),
                MIN_LEN,
                MAX_LEN
            )));
        }
        let bytes = iban.as_bytes();
        if !bytes[..2].iter().all(u8::is_ascii_uppercase) {
            return Err(BuildingError::InvalidIban("country code must be two letters".into()));
        }
        if !bytes[2..4].iter().all(u8::is_ascii_digit) {
            return Err(BuildingError::InvalidIban("check digits must be numeric".into()));
        }
        if !bytes.iter().all(u8::is_ascii_alphanumeric) {
            return Err(BuildingError::InvalidIban("only letters and digits allowed".into()));
        }
        let rearranged = format!("{}{}", &iban[4..], &iban[..4]);
        if mod97(&rearranged) != 1 {
            return Err(BuildingError::InvalidIban("checksum mismatch".into()));
        }
        Ok(Self(iban))
    }

    /// Builds an IBAN from a country code and BBAN, computing the check digits
    pub fn from_parts(country: &str, bban: &str) -> Result<Self, BuildingError> {
        let country = Self::normalize(country);
        let bban = Self::normalize(bban);
        let check = 98 - mod97(&format!("{}{}00", bban, country));
        Self::parse(&format!("{}{:02}{}", country, check, bban))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn country_code(&self) -> &str {
        &self.0[..2]
    }

    /// Print form, in groups of four
    pub fn formatted(&self) -> String {
        self.0
            .as_bytes()
            .chunks(4)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Remainder of the IBAN numeric expansion (A=10 .. Z=35) modulo 97
fn mod97(s: &str) -> u32 {
    s.chars().fold(0u32, |acc, c| match c.to_digit(36) {
        Some(v) if v < 10 => (acc * 10 + v) % 97,
        Some(v) => (acc * 100 + v) % 97,
        None => acc,
    })
}

impl fmt::Display for Iban {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Iban {
    type Error = BuildingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Iban::parse(&value)
    }
}

impl From<Iban> for String {
    fn from(iban: Iban) -> String {
        iban.0
    }
}

/// An IBAN registered by a resident for an apartment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidentIban {
    pub id: ResidentIbanId,
    pub apartment_id: ApartmentId,
    pub label: String,
    pub iban: Iban,
    /// At most one primary IBAN per apartment
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

impl ResidentIban {
    pub fn new(apartment_id: ApartmentId, label: impl Into<String>, iban: Iban, is_primary: bool) -> Self {
        Self {
            id: ResidentIbanId::new_v7(),
            apartment_id,
            label: label.into(),
            iban,
            is_primary,
            created_at: Utc::now(),
        }
    }
}
