//! User administration and doctor directory

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{
        appointment::Appointment,
        user::{CreateStaff, DoctorQuery, User, UserQuery, UserShort},
    },
};

use super::AuthenticatedUser;

/// Result of a patient deactivation
#[derive(Serialize, ToSchema)]
pub struct DeactivationResponse {
    pub user: User,
    /// Future appointments cancelled along with the account
    pub cancelled_appointments: Vec<Appointment>,
}

/// List users
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    params(UserQuery),
    responses(
        (status = 200, description = "List of users", body = Vec<User>),
        (status = 403, description = "Administrator privileges required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_users(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<Vec<User>>> {
    claims.require_admin()?;

    let users = state.services.users.list(&query).await?;
    Ok(Json(users))
}

/// Get user details by ID
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User details", body = User),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<User>> {
    claims.require_self_or_admin(id)?;

    let user = state.services.users.get_by_id(id).await?;
    Ok(Json(user))
}

/// Create a doctor or administrator account
#[utoipa::path(
    post,
    path = "/users/staff",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = CreateStaff,
    responses(
        (status = 201, description = "Account created", body = User),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_staff(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateStaff>,
) -> AppResult<(StatusCode, Json<User>)> {
    claims.require_admin()?;

    let created = state.services.users.create_staff(request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Deactivate a patient and cancel their future appointments
#[utoipa::path(
    post,
    path = "/users/{id}/deactivate",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Patient ID")
    ),
    responses(
        (status = 200, description = "Patient deactivated", body = DeactivationResponse),
        (status = 404, description = "Active patient not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn deactivate_patient(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<DeactivationResponse>> {
    claims.require_admin()?;

    let (user, cancelled_appointments) = state.services.users.deactivate_patient(id).await?;
    Ok(Json(DeactivationResponse {
        user,
        cancelled_appointments,
    }))
}

/// Public list of active doctors
#[utoipa::path(
    get,
    path = "/doctors",
    tag = "users",
    params(DoctorQuery),
    responses(
        (status = 200, description = "Active doctors", body = Vec<UserShort>)
    )
)]
pub async fn list_doctors(
    State(state): State<crate::AppState>,
    Query(query): Query<DoctorQuery>,
) -> AppResult<Json<Vec<UserShort>>> {
    let doctors = state.services.users.list_doctors(query.specialty).await?;
    Ok(Json(doctors))
}
