//! Database models for student records.
//!
//! A student is a person record plus enrolment details, keyed by the person's id.

use crate::db::models::persons::{PersonDBResponse, PersonWriteDBRequest};
use crate::types::{SchoolLevel, Section};

/// Enrolment details stored alongside the person record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enrolment {
    /// 1 to 6
    pub grade: i16,
    pub section: Section,
    pub school_level: SchoolLevel,
}

/// Fields written on create and on full update
#[derive(Debug, Clone)]
pub struct StudentWriteDBRequest {
    pub person: PersonWriteDBRequest,
    pub enrolment: Enrolment,
}

#[derive(Debug, Clone)]
pub struct StudentDBResponse {
    pub person: PersonDBResponse,
    pub enrolment: Enrolment,
}
