//! API request/response models for student records.
//!
//! Student payloads carry every person field at the top level next to the enrolment fields.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::models::persons::{PersonCreate, PersonResponse, PersonUpdate};
use crate::db::models::students::{Enrolment, StudentDBResponse, StudentWriteDBRequest};
use crate::errors::Error;
use crate::types::{SchoolLevel, Section};

const GRADE_MIN: i16 = 1;
const GRADE_MAX: i16 = 6;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StudentCreate {
    #[serde(flatten)]
    pub person: PersonCreate,
    /// 1 to 6
    pub grade: i16,
    pub section: Section,
    pub school_level: SchoolLevel,
}

/// Partial update. Absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct StudentUpdate {
    #[serde(flatten)]
    pub person: PersonUpdate,
    pub grade: Option<i16>,
    pub section: Option<Section>,
    pub school_level: Option<SchoolLevel>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentResponse {
    #[serde(flatten)]
    pub person: PersonResponse,
    pub grade: i16,
    pub section: Section,
    pub school_level: SchoolLevel,
}

impl From<StudentDBResponse> for StudentResponse {
    fn from(db: StudentDBResponse) -> Self {
        Self {
            person: db.person.into(),
            grade: db.enrolment.grade,
            section: db.enrolment.section,
            school_level: db.enrolment.school_level,
        }
    }
}

fn validate_grade(grade: i16) -> Result<i16, Error> {
    if (GRADE_MIN..=GRADE_MAX).contains(&grade) {
        Ok(grade)
    } else {
        Err(Error::BadRequest {
            message: format!("grade must be between {GRADE_MIN} and {GRADE_MAX}"),
        })
    }
}

impl StudentCreate {
    pub fn into_db_request(self, today: NaiveDate) -> Result<StudentWriteDBRequest, Error> {
        let enrolment = Enrolment {
            grade: validate_grade(self.grade)?,
            section: self.section,
            school_level: self.school_level,
        };
        Ok(StudentWriteDBRequest {
            person: self.person.into_db_request(today)?,
            enrolment,
        })
    }
}

impl StudentUpdate {
    /// Merge onto the stored record, then validate the result as a whole.
    pub fn merge_into(self, current: StudentDBResponse, today: NaiveDate) -> Result<StudentWriteDBRequest, Error> {
        let enrolment = Enrolment {
            grade: validate_grade(self.grade.unwrap_or(current.enrolment.grade))?,
            section: self.section.unwrap_or(current.enrolment.section),
            school_level: self.school_level.unwrap_or(current.enrolment.school_level),
        };
        Ok(StudentWriteDBRequest {
            person: self.person.merge_into(current.person, today)?,
            enrolment,
        })
    }
}
