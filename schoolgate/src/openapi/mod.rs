//! OpenAPI documentation for the `/api` surface.
//!
//! Served as JSON at `/api-docs/openapi.json` and rendered with Scalar at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api;
use crate::types::{PermissionName, RoleName, SchoolLevel, Section};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Token returned by `POST /auth/login`. Send it in the `Authorization` header:\n\n\
                            ```\nAuthorization: Bearer YOUR_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "School records API", description = "Authentication, role administration, person and student records"),
    servers(
        (url = "/api", description = "School records API")
    ),
    modifiers(&SecurityAddon),
    security(("BearerAuth" = [])),
    paths(
        api::handlers::auth::login,
        api::handlers::auth::forgot_password,
        api::handlers::auth::reset_password,
        api::handlers::users::get_me,
        api::handlers::users::create_account,
        api::handlers::users::assign_role,
        api::handlers::roles::list_permissions,
        api::handlers::roles::list_roles,
        api::handlers::roles::create_role,
        api::handlers::roles::get_role,
        api::handlers::roles::update_role,
        api::handlers::roles::delete_role,
        api::handlers::roles::add_role_permission,
        api::handlers::roles::remove_role_permission,
        api::handlers::persons::list_persons,
        api::handlers::persons::create_person,
        api::handlers::persons::get_person,
        api::handlers::persons::update_person,
        api::handlers::persons::delete_person,
        api::handlers::students::list_students,
        api::handlers::students::create_student,
        api::handlers::students::get_student,
        api::handlers::students::update_student,
        api::handlers::students::delete_student,
    ),
    components(
        schemas(
            RoleName,
            PermissionName,
            Section,
            SchoolLevel,
            api::models::auth::LoginRequest,
            api::models::auth::LoginResponse,
            api::models::auth::ForgotPasswordRequest,
            api::models::auth::ResetPasswordRequest,
            api::models::auth::MessageResponse,
            api::models::users::AccountCreate,
            api::models::users::RoleAssignment,
            api::models::users::AccountResponse,
            api::models::users::MeResponse,
            api::models::roles::RoleCreate,
            api::models::roles::RoleUpdate,
            api::models::roles::RoleResponse,
            api::models::roles::PermissionResponse,
            api::models::persons::PersonCreate,
            api::models::persons::PersonUpdate,
            api::models::persons::PersonResponse,
            api::models::students::StudentCreate,
            api::models::students::StudentUpdate,
            api::models::students::StudentResponse,
        )
    ),
    tags(
        (name = "authentication", description = "Login and password reset"),
        (name = "users", description = "Accounts and role assignment"),
        (name = "roles", description = "Roles and the permission catalog"),
        (name = "persons", description = "Person records"),
        (name = "students", description = "Student records"),
    )
)]
pub struct ApiDoc;
