use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use super::PgStore;
use crate::db::errors::Result;
use crate::db::models::persons::{PersonDBResponse, PersonWriteDBRequest};
use crate::db::store::PersonStore;
use crate::types::{PersonId, abbrev_uuid};

pub(super) const PERSON_COLUMNS: &str = "id, first_name, last_name, dni, birth_date, gender, address, phone, account_id, created_at, updated_at";

pub(super) async fn insert_person(conn: &mut PgConnection, request: &PersonWriteDBRequest, now: DateTime<Utc>) -> Result<PersonDBResponse> {
    let person = sqlx::query_as::<_, PersonDBResponse>(&format!(
        "INSERT INTO persons (id, first_name, last_name, dni, birth_date, gender, address, phone, account_id, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
         RETURNING {PERSON_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&request.first_name)
    .bind(&request.last_name)
    .bind(&request.dni)
    .bind(request.birth_date)
    .bind(&request.gender)
    .bind(&request.address)
    .bind(&request.phone)
    .bind(request.account_id)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    Ok(person)
}

pub(super) async fn rewrite_person(
    conn: &mut PgConnection,
    id: PersonId,
    request: &PersonWriteDBRequest,
    now: DateTime<Utc>,
) -> Result<Option<PersonDBResponse>> {
    let person = sqlx::query_as::<_, PersonDBResponse>(&format!(
        "UPDATE persons SET first_name = $2, last_name = $3, dni = $4, birth_date = $5, gender = $6,
             address = $7, phone = $8, account_id = $9, updated_at = $10
         WHERE id = $1
         RETURNING {PERSON_COLUMNS}"
    ))
    .bind(id)
    .bind(&request.first_name)
    .bind(&request.last_name)
    .bind(&request.dni)
    .bind(request.birth_date)
    .bind(&request.gender)
    .bind(&request.address)
    .bind(&request.phone)
    .bind(request.account_id)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(person)
}

#[async_trait]
impl PersonStore for PgStore {
    #[instrument(skip(self), err)]
    async fn list_persons(&self) -> Result<Vec<PersonDBResponse>> {
        let persons = sqlx::query_as::<_, PersonDBResponse>(&format!("SELECT {PERSON_COLUMNS} FROM persons ORDER BY created_at, id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(persons)
    }

    #[instrument(skip(self), fields(person_id = %abbrev_uuid(&id)), err)]
    async fn get_person(&self, id: PersonId) -> Result<Option<PersonDBResponse>> {
        let person = sqlx::query_as::<_, PersonDBResponse>(&format!("SELECT {PERSON_COLUMNS} FROM persons WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(person)
    }

    #[instrument(skip(self, request), err)]
    async fn create_person(&self, request: &PersonWriteDBRequest) -> Result<PersonDBResponse> {
        let mut conn = self.pool.acquire().await?;
        insert_person(&mut conn, request, Utc::now()).await
    }

    #[instrument(skip(self, request), fields(person_id = %abbrev_uuid(&id)), err)]
    async fn update_person(&self, id: PersonId, request: &PersonWriteDBRequest) -> Result<Option<PersonDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        rewrite_person(&mut conn, id, request, Utc::now()).await
    }

    #[instrument(skip(self), fields(person_id = %abbrev_uuid(&id)), err)]
    async fn delete_person(&self, id: PersonId) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM persons WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(deleted.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::errors::DbError;
    use crate::db::store::AccountStore;
    use crate::test_utils::{account_request, create_pg_store};
    use chrono::NaiveDate;
    use sqlx::PgPool;

    fn write(dni: &str) -> PersonWriteDBRequest {
        PersonWriteDBRequest {
            first_name: "Ana".to_string(),
            last_name: "Quispe".to_string(),
            dni: dni.to_string(),
            birth_date: NaiveDate::from_ymd_opt(2010, 3, 14).unwrap(),
            gender: "F".to_string(),
            address: None,
            phone: None,
            account_id: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_person_crud(pool: PgPool) {
        let store = create_pg_store(pool).await;
        let person = store.create_person(&write("12345678")).await.unwrap();
        assert_eq!(store.get_person(person.id).await.unwrap().unwrap().dni, "12345678");

        let mut changed = write("12345678");
        changed.phone = Some("987654321".to_string());
        let updated = store.update_person(person.id, &changed).await.unwrap().unwrap();
        assert_eq!(updated.phone.as_deref(), Some("987654321"));
        assert!(store.update_person(Uuid::new_v4(), &changed).await.unwrap().is_none());

        assert_eq!(store.list_persons().await.unwrap().len(), 1);
        assert!(store.delete_person(person.id).await.unwrap());
        assert!(!store.delete_person(person.id).await.unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_person_constraints(pool: PgPool) {
        let store = create_pg_store(pool).await;
        store.create_person(&write("12345678")).await.unwrap();

        let err = store.create_person(&write("12345678")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref constraint, .. } if constraint.as_deref() == Some("persons_dni_key")));

        let mut linked = write("11112222");
        linked.account_id = Some(Uuid::new_v4());
        assert!(matches!(store.create_person(&linked).await.unwrap_err(), DbError::ForeignKeyViolation { .. }));

        let account = store.create_account(&account_request("ana", None)).await.unwrap();
        linked.account_id = Some(account.id);
        store.create_person(&linked).await.unwrap();
        let mut second = write("33334444");
        second.account_id = Some(account.id);
        assert!(matches!(store.create_person(&second).await.unwrap_err(), DbError::UniqueViolation { .. }));
    }
}
