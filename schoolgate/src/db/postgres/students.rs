use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

use super::PgStore;
use super::persons::{insert_person, rewrite_person};
use crate::db::errors::Result;
use crate::db::models::persons::PersonDBResponse;
use crate::db::models::students::{Enrolment, StudentDBResponse, StudentWriteDBRequest};
use crate::db::store::StudentStore;
use crate::types::{PersonId, abbrev_uuid};

const STUDENT_SELECT: &str = "SELECT p.id, p.first_name, p.last_name, p.dni, p.birth_date, p.gender, p.address, p.phone,
        p.account_id, p.created_at, p.updated_at, s.grade, s.section, s.school_level
     FROM students s JOIN persons p ON p.id = s.person_id";

#[derive(FromRow)]
struct StudentRow {
    #[sqlx(flatten)]
    person: PersonDBResponse,
    grade: i16,
    section: String,
    school_level: String,
}

impl TryFrom<StudentRow> for StudentDBResponse {
    type Error = crate::db::errors::DbError;

    fn try_from(row: StudentRow) -> Result<Self> {
        Ok(StudentDBResponse {
            person: row.person,
            enrolment: Enrolment {
                grade: row.grade,
                section: row.section.parse()?,
                school_level: row.school_level.parse()?,
            },
        })
    }
}

async fn write_enrolment(conn: &mut PgConnection, id: PersonId, enrolment: &Enrolment) -> Result<()> {
    sqlx::query(
        "INSERT INTO students (person_id, grade, section, school_level) VALUES ($1, $2, $3, $4)
         ON CONFLICT (person_id) DO UPDATE
         SET grade = EXCLUDED.grade, section = EXCLUDED.section, school_level = EXCLUDED.school_level",
    )
    .bind(id)
    .bind(enrolment.grade)
    .bind(enrolment.section.as_str())
    .bind(enrolment.school_level.as_str())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[async_trait]
impl StudentStore for PgStore {
    #[instrument(skip(self), err)]
    async fn list_students(&self) -> Result<Vec<StudentDBResponse>> {
        let rows = sqlx::query_as::<_, StudentRow>(&format!("{STUDENT_SELECT} ORDER BY p.created_at, p.id"))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(StudentDBResponse::try_from).collect()
    }

    #[instrument(skip(self), fields(student_id = %abbrev_uuid(&id)), err)]
    async fn get_student(&self, id: PersonId) -> Result<Option<StudentDBResponse>> {
        let row = sqlx::query_as::<_, StudentRow>(&format!("{STUDENT_SELECT} WHERE s.person_id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(StudentDBResponse::try_from).transpose()
    }

    #[instrument(skip(self, request), err)]
    async fn create_student(&self, request: &StudentWriteDBRequest) -> Result<StudentDBResponse> {
        let mut tx = self.pool.begin().await?;
        let person = insert_person(&mut tx, &request.person, Utc::now()).await?;
        write_enrolment(&mut tx, person.id, &request.enrolment).await?;
        tx.commit().await?;

        Ok(StudentDBResponse {
            person,
            enrolment: request.enrolment,
        })
    }

    #[instrument(skip(self, request), fields(student_id = %abbrev_uuid(&id)), err)]
    async fn update_student(&self, id: PersonId, request: &StudentWriteDBRequest) -> Result<Option<StudentDBResponse>> {
        let mut tx = self.pool.begin().await?;

        let is_student: Option<PersonId> = sqlx::query_scalar("SELECT person_id FROM students WHERE person_id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if is_student.is_none() {
            return Ok(None);
        }

        let Some(person) = rewrite_person(&mut tx, id, &request.person, Utc::now()).await? else {
            return Ok(None);
        };
        write_enrolment(&mut tx, id, &request.enrolment).await?;
        tx.commit().await?;

        Ok(Some(StudentDBResponse {
            person,
            enrolment: request.enrolment,
        }))
    }

    #[instrument(skip(self), fields(student_id = %abbrev_uuid(&id)), err)]
    async fn delete_student(&self, id: PersonId) -> Result<bool> {
        // the enrolment row goes with the person through ON DELETE CASCADE
        let deleted = sqlx::query("DELETE FROM persons WHERE id = $1 AND EXISTS (SELECT 1 FROM students WHERE person_id = $1)")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(deleted.rows_affected() > 0)
    }
}
