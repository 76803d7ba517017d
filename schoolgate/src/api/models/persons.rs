//! API request/response models for person records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::persons::{PersonDBResponse, PersonWriteDBRequest};
use crate::errors::Error;
use crate::types::{AccountId, PersonId};

const NAME_MAX: usize = 50;
const GENDER_MAX: usize = 10;
const ADDRESS_MAX: usize = 100;
const PHONE_MAX: usize = 15;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PersonCreate {
    pub first_name: String,
    pub last_name: String,
    /// National identity document number, exactly 8 digits
    pub dni: String,
    pub birth_date: NaiveDate,
    pub gender: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    /// Login account linked to this person
    #[schema(value_type = Option<String>, format = "uuid")]
    pub account_id: Option<AccountId>,
}

/// Partial update. Absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PersonUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub dni: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub account_id: Option<AccountId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PersonResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PersonId,
    pub first_name: String,
    pub last_name: String,
    pub dni: String,
    pub birth_date: NaiveDate,
    pub gender: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub account_id: Option<AccountId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PersonDBResponse> for PersonResponse {
    fn from(db: PersonDBResponse) -> Self {
        Self {
            id: db.id,
            first_name: db.first_name,
            last_name: db.last_name,
            dni: db.dni,
            birth_date: db.birth_date,
            gender: db.gender,
            address: db.address,
            phone: db.phone,
            account_id: db.account_id,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl PersonCreate {
    /// Validate and normalise into a store request. `today` is the reference for the
    /// birth date check.
    pub fn into_db_request(self, today: NaiveDate) -> Result<PersonWriteDBRequest, Error> {
        let request = PersonWriteDBRequest {
            first_name: required("first_name", &self.first_name, NAME_MAX)?,
            last_name: required("last_name", &self.last_name, NAME_MAX)?,
            dni: self.dni.trim().to_string(),
            birth_date: self.birth_date,
            gender: required("gender", &self.gender, GENDER_MAX)?,
            address: optional("address", self.address.as_deref(), ADDRESS_MAX)?,
            phone: optional("phone", self.phone.as_deref(), PHONE_MAX)?,
            account_id: self.account_id,
        };
        validate_dni(&request.dni)?;
        validate_birth_date(request.birth_date, today)?;
        Ok(request)
    }
}

impl PersonUpdate {
    /// Merge onto the stored record, then validate the result as a whole.
    pub fn merge_into(self, current: PersonDBResponse, today: NaiveDate) -> Result<PersonWriteDBRequest, Error> {
        PersonCreate {
            first_name: self.first_name.unwrap_or(current.first_name),
            last_name: self.last_name.unwrap_or(current.last_name),
            dni: self.dni.unwrap_or(current.dni),
            birth_date: self.birth_date.unwrap_or(current.birth_date),
            gender: self.gender.unwrap_or(current.gender),
            address: self.address.or(current.address),
            phone: self.phone.or(current.phone),
            account_id: self.account_id.or(current.account_id),
        }
        .into_db_request(today)
    }
}

fn required(field: &str, value: &str, max: usize) -> Result<String, Error> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::BadRequest {
            message: format!("{field} must not be blank"),
        });
    }
    if value.chars().count() > max {
        return Err(Error::BadRequest {
            message: format!("{field} must be at most {max} characters"),
        });
    }
    Ok(value.to_string())
}

fn optional(field: &str, value: Option<&str>, max: usize) -> Result<Option<String>, Error> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) if v.chars().count() > max => Err(Error::BadRequest {
            message: format!("{field} must be at most {max} characters"),
        }),
        Some(v) => Ok(Some(v.to_string())),
        None => Ok(None),
    }
}

fn validate_dni(dni: &str) -> Result<(), Error> {
    if dni.len() == 8 && dni.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(Error::BadRequest {
            message: "dni must be exactly 8 digits".to_string(),
        })
    }
}

fn validate_birth_date(birth_date: NaiveDate, today: NaiveDate) -> Result<(), Error> {
    if birth_date < today {
        Ok(())
    } else {
        Err(Error::BadRequest {
            message: "birth_date must be in the past".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn valid() -> PersonCreate {
        PersonCreate {
            first_name: "  Rosa ".to_string(),
            last_name: "Quispe".to_string(),
            dni: "45678912".to_string(),
            birth_date: NaiveDate::from_ymd_opt(2012, 5, 14).unwrap(),
            gender: "F".to_string(),
            address: Some("   ".to_string()),
            phone: Some("987654321".to_string()),
            account_id: None,
        }
    }

    #[test]
    fn test_valid_person_is_normalised() {
        let request = valid().into_db_request(today()).unwrap();
        assert_eq!(request.first_name, "Rosa");
        assert_eq!(request.address, None);
        assert_eq!(request.phone.as_deref(), Some("987654321"));
    }

    #[test]
    fn test_dni_must_be_eight_digits() {
        for dni in ["1234567", "123456789", "1234567a", "", "１２３４５６７８"] {
            let person = PersonCreate {
                dni: dni.to_string(),
                ..valid()
            };
            assert!(
                matches!(person.into_db_request(today()), Err(Error::BadRequest { .. })),
                "dni {dni:?} accepted"
            );
        }
    }

    #[test]
    fn test_birth_date_must_be_past() {
        let person = PersonCreate {
            birth_date: today(),
            ..valid()
        };
        assert!(person.into_db_request(today()).is_err());
    }

    #[test]
    fn test_length_limits() {
        let person = PersonCreate {
            gender: "x".repeat(11),
            ..valid()
        };
        assert!(person.into_db_request(today()).is_err());

        let person = PersonCreate {
            last_name: " ".to_string(),
            ..valid()
        };
        assert!(person.into_db_request(today()).is_err());
    }

    #[test]
    fn test_update_merges_onto_current() {
        let current = PersonDBResponse {
            id: uuid::Uuid::new_v4(),
            first_name: "Rosa".to_string(),
            last_name: "Quispe".to_string(),
            dni: "45678912".to_string(),
            birth_date: NaiveDate::from_ymd_opt(2012, 5, 14).unwrap(),
            gender: "F".to_string(),
            address: Some("Av. Lima 123".to_string()),
            phone: None,
            account_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let update = PersonUpdate {
            phone: Some("999888777".to_string()),
            ..Default::default()
        };

        let request = update.merge_into(current, today()).unwrap();
        assert_eq!(request.first_name, "Rosa");
        assert_eq!(request.address.as_deref(), Some("Av. Lima 123"));
        assert_eq!(request.phone.as_deref(), Some("999888777"));
    }
}
