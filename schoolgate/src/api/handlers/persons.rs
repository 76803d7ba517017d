use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use tracing::info;

use crate::{
    AppState,
    api::models::persons::{PersonCreate, PersonResponse, PersonUpdate},
    auth::permissions::{RequiresPermission, permission},
    db::store::PersonStore,
    errors::{Error, Result},
    types::{PersonId, abbrev_uuid},
};

fn person_not_found(id: PersonId) -> Error {
    Error::NotFound {
        resource: "Person".to_string(),
        id: id.to_string(),
    }
}

/// List person records
#[utoipa::path(
    get,
    path = "/persons",
    tag = "persons",
    responses(
        (status = 200, description = "All person records", body = [PersonResponse]),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Missing GET_PERSONS"),
    )
)]
#[tracing::instrument(skip_all, fields(username = %current_user.username))]
pub async fn list_persons(
    State(state): State<AppState>,
    current_user: RequiresPermission<permission::GetPersons>,
) -> Result<Json<Vec<PersonResponse>>> {
    let persons = state.store.list_persons().await?;
    Ok(Json(persons.into_iter().map(PersonResponse::from).collect()))
}

/// Create a person record
#[utoipa::path(
    post,
    path = "/persons",
    request_body = PersonCreate,
    tag = "persons",
    responses(
        (status = 201, description = "Person created", body = PersonResponse),
        (status = 400, description = "Invalid person data or unknown account"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Missing CREATE_PERSON"),
        (status = 409, description = "DNI or account already used by another person"),
    )
)]
#[tracing::instrument(skip_all, fields(username = %current_user.username))]
pub async fn create_person(
    State(state): State<AppState>,
    current_user: RequiresPermission<permission::CreatePerson>,
    Json(request): Json<PersonCreate>,
) -> Result<(StatusCode, Json<PersonResponse>)> {
    let request = request.into_db_request(Utc::now().date_naive())?;
    let person = state.store.create_person(&request).await?;

    info!(person_id = %abbrev_uuid(&person.id), "Created person");
    Ok((StatusCode::CREATED, Json(person.into())))
}

/// Get a person record
#[utoipa::path(
    get,
    path = "/persons/{id}",
    tag = "persons",
    params(
        ("id" = String, Path, description = "Person ID")
    ),
    responses(
        (status = 200, description = "Person record", body = PersonResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Missing GET_PERSON"),
        (status = 404, description = "Person not found"),
    )
)]
#[tracing::instrument(skip_all, fields(username = %current_user.username, person_id = %abbrev_uuid(&id)))]
pub async fn get_person(
    State(state): State<AppState>,
    Path(id): Path<PersonId>,
    current_user: RequiresPermission<permission::GetPerson>,
) -> Result<Json<PersonResponse>> {
    let person = state.store.get_person(id).await?.ok_or_else(|| person_not_found(id))?;
    Ok(Json(person.into()))
}

/// Update a person record. Absent fields keep their current value.
#[utoipa::path(
    put,
    path = "/persons/{id}",
    request_body = PersonUpdate,
    tag = "persons",
    params(
        ("id" = String, Path, description = "Person ID")
    ),
    responses(
        (status = 200, description = "Person updated", body = PersonResponse),
        (status = 400, description = "Invalid person data or unknown account"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Missing UPDATE_PERSON"),
        (status = 404, description = "Person not found"),
        (status = 409, description = "DNI or account already used by another person"),
    )
)]
#[tracing::instrument(skip_all, fields(username = %current_user.username, person_id = %abbrev_uuid(&id)))]
pub async fn update_person(
    State(state): State<AppState>,
    Path(id): Path<PersonId>,
    current_user: RequiresPermission<permission::UpdatePerson>,
    Json(update): Json<PersonUpdate>,
) -> Result<Json<PersonResponse>> {
    let current = state.store.get_person(id).await?.ok_or_else(|| person_not_found(id))?;
    let request = update.merge_into(current, Utc::now().date_naive())?;

    let person = state
        .store
        .update_person(id, &request)
        .await?
        .ok_or_else(|| person_not_found(id))?;

    info!("Updated person");
    Ok(Json(person.into()))
}

/// Delete a person record
#[utoipa::path(
    delete,
    path = "/persons/{id}",
    tag = "persons",
    params(
        ("id" = String, Path, description = "Person ID")
    ),
    responses(
        (status = 204, description = "Person deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Missing DELETE_PERSON"),
        (status = 404, description = "Person not found"),
    )
)]
#[tracing::instrument(skip_all, fields(username = %current_user.username, person_id = %abbrev_uuid(&id)))]
pub async fn delete_person(
    State(state): State<AppState>,
    Path(id): Path<PersonId>,
    current_user: RequiresPermission<permission::DeletePerson>,
) -> Result<StatusCode> {
    if !state.store.delete_person(id).await? {
        return Err(person_not_found(id));
    }
    info!("Deleted person");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{bearer, create_test_account, create_test_server, create_test_state};
    use crate::types::RoleName;
    use axum_test::TestServer;
    use serde_json::{Value, json};
    use uuid::Uuid;

    fn rosa() -> Value {
        json!({
            "first_name": "Rosa",
            "last_name": "Quispe",
            "dni": "45678912",
            "birth_date": "2012-05-14",
            "gender": "F",
            "address": "Av. Lima 123"
        })
    }

    async fn setup() -> (AppState, TestServer, String) {
        let state = create_test_state().await;
        create_test_account(&state, "root", Some(RoleName::Administrator)).await;
        let token = bearer(&state, "root");
        (state.clone(), create_test_server(state), token)
    }

    #[tokio::test]
    async fn test_person_crud() {
        let (_, server, root) = setup().await;

        let response = server.post("/api/persons").add_header("authorization", root.clone()).json(&rosa()).await;
        response.assert_status(StatusCode::CREATED);
        let created: PersonResponse = response.json();
        assert_eq!(created.dni, "45678912");
        assert_eq!(created.phone, None);

        let updated: PersonResponse = server
            .put(&format!("/api/persons/{}", created.id))
            .add_header("authorization", root.clone())
            .json(&json!({"phone": "987654321"}))
            .await
            .json();
        assert_eq!(updated.phone.as_deref(), Some("987654321"));
        assert_eq!(updated.address.as_deref(), Some("Av. Lima 123"));

        let listed: Vec<PersonResponse> = server.get("/api/persons").add_header("authorization", root.clone()).await.json();
        assert_eq!(listed.len(), 1);

        server
            .delete(&format!("/api/persons/{}", created.id))
            .add_header("authorization", root.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .get(&format!("/api/persons/{}", created.id))
            .add_header("authorization", root)
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn test_duplicate_dni_conflicts() {
        let (_, server, root) = setup().await;
        server
            .post("/api/persons")
            .add_header("authorization", root.clone())
            .json(&rosa())
            .await
            .assert_status(StatusCode::CREATED);

        let response = server.post("/api/persons").add_header("authorization", root).json(&rosa()).await;
        response.assert_status(StatusCode::CONFLICT);
        assert_eq!(response.json::<Value>()["message"], "A person with this DNI already exists");
    }

    #[tokio::test]
    async fn test_invalid_person_rejected() {
        let (_, server, root) = setup().await;
        let mut body = rosa();
        body["dni"] = json!("1234");

        server
            .post("/api/persons")
            .add_header("authorization", root.clone())
            .json(&body)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let mut body = rosa();
        body["account_id"] = json!(Uuid::new_v4());
        server
            .post("/api/persons")
            .add_header("authorization", root)
            .json(&body)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_teacher_reads_but_cannot_delete() {
        let (state, server, root) = setup().await;
        create_test_account(&state, "alice", Some(RoleName::Teacher)).await;
        let alice = bearer(&state, "alice");

        let created: PersonResponse = server.post("/api/persons").add_header("authorization", root).json(&rosa()).await.json();
        let path = format!("/api/persons/{}", created.id);

        server.get(&path).add_header("authorization", alice.clone()).await.assert_status_ok();
        server.delete(&path).add_header("authorization", alice.clone()).await.assert_status_forbidden();
        server
            .post("/api/persons")
            .add_header("authorization", alice)
            .json(&rosa())
            .await
            .assert_status_forbidden();
        server.get(&path).await.assert_status_unauthorized();
    }

    #[tokio::test]
    async fn test_account_without_role_is_forbidden() {
        let (state, server, _) = setup().await;
        create_test_account(&state, "nobody", None).await;

        server
            .get("/api/persons")
            .add_header("authorization", bearer(&state, "nobody"))
            .await
            .assert_status_forbidden();
    }
}
