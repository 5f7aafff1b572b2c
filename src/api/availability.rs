//! Doctor availability endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::availability::{
        AvailabilityQuery, CreateAvailability, DaySlots, DoctorAvailability, UpdateAvailability,
        UpdateAvailabilityStatus,
    },
};

use super::AuthenticatedUser;

/// Open slots of a doctor between two dates (inclusive)
#[utoipa::path(
    get,
    path = "/availability/doctor/{id}",
    tag = "availability",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Doctor ID"),
        AvailabilityQuery
    ),
    responses(
        (status = 200, description = "Open slots grouped by date", body = Vec<DaySlots>),
        (status = 400, description = "Invalid range", body = crate::error::ErrorResponse),
        (status = 404, description = "Doctor not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn resolve_slots(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(doctor_id): Path<i32>,
    Query(query): Query<AvailabilityQuery>,
) -> AppResult<Json<Vec<DaySlots>>> {
    let days = state.services.availability.resolve(doctor_id, &query).await?;
    Ok(Json(days))
}

/// Availability windows of a doctor
#[utoipa::path(
    get,
    path = "/availability/doctor/{id}/windows",
    tag = "availability",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Doctor ID")
    ),
    responses(
        (status = 200, description = "Availability windows", body = Vec<DoctorAvailability>)
    )
)]
pub async fn list_windows(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(doctor_id): Path<i32>,
) -> AppResult<Json<Vec<DoctorAvailability>>> {
    claims.require_self_or_admin(doctor_id)?;

    let windows = state.services.availability.list_windows(doctor_id).await?;
    Ok(Json(windows))
}

/// Create an availability window
#[utoipa::path(
    post,
    path = "/availability",
    tag = "availability",
    security(("bearer_auth" = [])),
    request_body = CreateAvailability,
    responses(
        (status = 201, description = "Window created", body = DoctorAvailability),
        (status = 400, description = "Invalid window", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_window(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateAvailability>,
) -> AppResult<(StatusCode, Json<DoctorAvailability>)> {
    claims.require_admin()?;

    let window = state.services.availability.create_window(request).await?;
    Ok((StatusCode::CREATED, Json(window)))
}

/// Update an availability window
#[utoipa::path(
    put,
    path = "/availability/{id}",
    tag = "availability",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Window ID")
    ),
    request_body = UpdateAvailability,
    responses(
        (status = 200, description = "Window updated", body = DoctorAvailability),
        (status = 404, description = "Window not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_window(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateAvailability>,
) -> AppResult<Json<DoctorAvailability>> {
    claims.require_admin()?;

    let window = state.services.availability.update_window(id, request).await?;
    Ok(Json(window))
}

/// Enable or disable an availability window
#[utoipa::path(
    patch,
    path = "/availability/{id}/status",
    tag = "availability",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Window ID")
    ),
    request_body = UpdateAvailabilityStatus,
    responses(
        (status = 200, description = "Status changed", body = DoctorAvailability),
        (status = 404, description = "Window not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_window_status(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateAvailabilityStatus>,
) -> AppResult<Json<DoctorAvailability>> {
    claims.require_admin()?;

    let window = state
        .services
        .availability
        .update_status(id, request.status)
        .await?;
    Ok(Json(window))
}

/// Delete an availability window
#[utoipa::path(
    delete,
    path = "/availability/{id}",
    tag = "availability",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Window ID")
    ),
    responses(
        (status = 204, description = "Window deleted"),
        (status = 409, description = "Appointments still depend on the window", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_window(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;

    state.services.availability.delete_window(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
