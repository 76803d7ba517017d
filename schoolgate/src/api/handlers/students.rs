use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use tracing::info;

use crate::{
    AppState,
    api::models::students::{StudentCreate, StudentResponse, StudentUpdate},
    auth::permissions::{RequiresRole, role},
    db::store::StudentStore,
    errors::{Error, Result},
    types::{PersonId, abbrev_uuid},
};

fn student_not_found(id: PersonId) -> Error {
    Error::NotFound {
        resource: "Student".to_string(),
        id: id.to_string(),
    }
}

/// List student records
#[utoipa::path(
    get,
    path = "/students",
    tag = "students",
    responses(
        (status = 200, description = "All student records", body = [StudentResponse]),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Caller is not an administrator"),
    )
)]
#[tracing::instrument(skip_all, fields(admin = %current_user.username))]
pub async fn list_students(
    State(state): State<AppState>,
    current_user: RequiresRole<role::Administrator>,
) -> Result<Json<Vec<StudentResponse>>> {
    let students = state.store.list_students().await?;
    Ok(Json(students.into_iter().map(StudentResponse::from).collect()))
}

/// Create a student record together with its person record
#[utoipa::path(
    post,
    path = "/students",
    request_body = StudentCreate,
    tag = "students",
    responses(
        (status = 201, description = "Student created", body = StudentResponse),
        (status = 400, description = "Invalid student data or unknown account"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Caller is not an administrator"),
        (status = 409, description = "DNI or account already used by another person"),
    )
)]
#[tracing::instrument(skip_all, fields(admin = %current_user.username))]
pub async fn create_student(
    State(state): State<AppState>,
    current_user: RequiresRole<role::Administrator>,
    Json(request): Json<StudentCreate>,
) -> Result<(StatusCode, Json<StudentResponse>)> {
    let request = request.into_db_request(Utc::now().date_naive())?;
    let student = state.store.create_student(&request).await?;

    info!(
        student_id = %abbrev_uuid(&student.person.id),
        grade = student.enrolment.grade,
        section = student.enrolment.section.as_str(),
        "Created student"
    );
    Ok((StatusCode::CREATED, Json(student.into())))
}

/// Get a student record
#[utoipa::path(
    get,
    path = "/students/{id}",
    tag = "students",
    params(
        ("id" = String, Path, description = "Student ID, the same as its person ID")
    ),
    responses(
        (status = 200, description = "Student record", body = StudentResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Caller is not an administrator"),
        (status = 404, description = "Student not found"),
    )
)]
#[tracing::instrument(skip_all, fields(admin = %current_user.username, student_id = %abbrev_uuid(&id)))]
pub async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<PersonId>,
    current_user: RequiresRole<role::Administrator>,
) -> Result<Json<StudentResponse>> {
    let student = state.store.get_student(id).await?.ok_or_else(|| student_not_found(id))?;
    Ok(Json(student.into()))
}

/// Update a student record. Absent fields keep their current value.
#[utoipa::path(
    put,
    path = "/students/{id}",
    request_body = StudentUpdate,
    tag = "students",
    params(
        ("id" = String, Path, description = "Student ID, the same as its person ID")
    ),
    responses(
        (status = 200, description = "Student updated", body = StudentResponse),
        (status = 400, description = "Invalid student data or unknown account"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Caller is not an administrator"),
        (status = 404, description = "Student not found"),
        (status = 409, description = "DNI or account already used by another person"),
    )
)]
#[tracing::instrument(skip_all, fields(admin = %current_user.username, student_id = %abbrev_uuid(&id)))]
pub async fn update_student(
    State(state): State<AppState>,
    Path(id): Path<PersonId>,
    current_user: RequiresRole<role::Administrator>,
    Json(update): Json<StudentUpdate>,
) -> Result<Json<StudentResponse>> {
    let current = state.store.get_student(id).await?.ok_or_else(|| student_not_found(id))?;
    let request = update.merge_into(current, Utc::now().date_naive())?;

    let student = state
        .store
        .update_student(id, &request)
        .await?
        .ok_or_else(|| student_not_found(id))?;

    info!("Updated student");
    Ok(Json(student.into()))
}

/// Delete a student record and its person record
#[utoipa::path(
    delete,
    path = "/students/{id}",
    tag = "students",
    params(
        ("id" = String, Path, description = "Student ID, the same as its person ID")
    ),
    responses(
        (status = 204, description = "Student deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Caller is not an administrator"),
        (status = 404, description = "Student not found"),
    )
)]
#[tracing::instrument(skip_all, fields(admin = %current_user.username, student_id = %abbrev_uuid(&id)))]
pub async fn delete_student(
    State(state): State<AppState>,
    Path(id): Path<PersonId>,
    current_user: RequiresRole<role::Administrator>,
) -> Result<StatusCode> {
    if !state.store.delete_student(id).await? {
        return Err(student_not_found(id));
    }
    info!("Deleted student");
    Ok(StatusCode::NO_CONTENT)
}
