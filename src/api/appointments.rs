//! Appointment endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::appointment::{
        AdminUpdateAppointment, Appointment, AppointmentQuery, AppointmentType, CreateAppointment,
        RescheduleAppointment,
    },
};

use super::AuthenticatedUser;

/// Book an appointment
#[utoipa::path(
    post,
    path = "/appointments",
    tag = "appointments",
    security(("bearer_auth" = [])),
    request_body = CreateAppointment,
    responses(
        (status = 201, description = "Appointment created", body = Appointment),
        (status = 400, description = "Invalid slot or input", body = crate::error::ErrorResponse),
        (status = 409, description = "Slot already booked", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_appointment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateAppointment>,
) -> AppResult<(StatusCode, Json<Appointment>)> {
    let appointment = state.services.booking.create(&claims, request).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

/// Get an appointment
#[utoipa::path(
    get,
    path = "/appointments/{id}",
    tag = "appointments",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Appointment ID")
    ),
    responses(
        (status = 200, description = "Appointment", body = Appointment),
        (status = 404, description = "Appointment not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_appointment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Appointment>> {
    let appointment = state.services.booking.get(&claims, id).await?;
    Ok(Json(appointment))
}

/// Appointments of a patient
#[utoipa::path(
    get,
    path = "/appointments/patient/{id}",
    tag = "appointments",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Patient ID")
    ),
    responses(
        (status = 200, description = "Patient appointments", body = Vec<Appointment>)
    )
)]
pub async fn list_patient_appointments(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(patient_id): Path<i32>,
) -> AppResult<Json<Vec<Appointment>>> {
    claims.require_staff_or_self(patient_id)?;

    let appointments = state.services.booking.list_by_patient(patient_id).await?;
    Ok(Json(appointments))
}

/// Agenda of a doctor, optionally for a single day
#[utoipa::path(
    get,
    path = "/appointments/doctor/{id}",
    tag = "appointments",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Doctor ID"),
        AppointmentQuery
    ),
    responses(
        (status = 200, description = "Doctor agenda", body = Vec<Appointment>),
        (status = 404, description = "Doctor not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_doctor_appointments(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(doctor_id): Path<i32>,
    Query(query): Query<AppointmentQuery>,
) -> AppResult<Json<Vec<Appointment>>> {
    claims.require_self_or_admin(doctor_id)?;

    let appointments = state
        .services
        .booking
        .list_by_doctor(doctor_id, query.date)
        .await?;
    Ok(Json(appointments))
}

/// Administrative edit (patient, doctor, slot, type, notes)
#[utoipa::path(
    put,
    path = "/appointments/{id}",
    tag = "appointments",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Appointment ID")
    ),
    request_body = AdminUpdateAppointment,
    responses(
        (status = 200, description = "Appointment updated", body = Appointment),
        (status = 400, description = "Invalid slot or input", body = crate::error::ErrorResponse),
        (status = 409, description = "Slot taken or appointment closed", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_appointment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<AdminUpdateAppointment>,
) -> AppResult<Json<Appointment>> {
    claims.require_admin()?;

    let appointment = state.services.booking.admin_update(id, request).await?;
    Ok(Json(appointment))
}

/// Move one's own appointment to another slot
#[utoipa::path(
    put,
    path = "/appointments/{id}/reschedule",
    tag = "appointments",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Appointment ID")
    ),
    request_body = RescheduleAppointment,
    responses(
        (status = 200, description = "Appointment rescheduled", body = Appointment),
        (status = 400, description = "Invalid slot", body = crate::error::ErrorResponse),
        (status = 409, description = "Slot taken or appointment closed", body = crate::error::ErrorResponse)
    )
)]
pub async fn reschedule_appointment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<RescheduleAppointment>,
) -> AppResult<Json<Appointment>> {
    let appointment = state.services.booking.reschedule(&claims, id, request).await?;
    Ok(Json(appointment))
}

/// Cancel an appointment
#[utoipa::path(
    post,
    path = "/appointments/{id}/cancel",
    tag = "appointments",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Appointment ID")
    ),
    responses(
        (status = 200, description = "Appointment cancelled", body = Appointment),
        (status = 409, description = "Transition not allowed", body = crate::error::ErrorResponse)
    )
)]
pub async fn cancel_appointment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Appointment>> {
    let appointment = state.services.booking.cancel(&claims, id).await?;
    Ok(Json(appointment))
}

/// Confirm a pending appointment
#[utoipa::path(
    post,
    path = "/appointments/{id}/confirm",
    tag = "appointments",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Appointment ID")
    ),
    responses(
        (status = 200, description = "Appointment confirmed", body = Appointment),
        (status = 409, description = "Transition not allowed", body = crate::error::ErrorResponse)
    )
)]
pub async fn confirm_appointment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Appointment>> {
    let appointment = state.services.booking.confirm(&claims, id).await?;
    Ok(Json(appointment))
}

/// Mark a confirmed appointment as completed
#[utoipa::path(
    post,
    path = "/appointments/{id}/complete",
    tag = "appointments",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Appointment ID")
    ),
    responses(
        (status = 200, description = "Appointment completed", body = Appointment),
        (status = 409, description = "Transition not allowed", body = crate::error::ErrorResponse)
    )
)]
pub async fn complete_appointment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Appointment>> {
    let appointment = state.services.booking.complete(&claims, id).await?;
    Ok(Json(appointment))
}

/// Appointment type catalogue
#[utoipa::path(
    get,
    path = "/appointment-types",
    tag = "appointments",
    responses(
        (status = 200, description = "Appointment types", body = Vec<AppointmentType>)
    )
)]
pub async fn list_appointment_types(
    State(state): State<crate::AppState>,
) -> AppResult<Json<Vec<AppointmentType>>> {
    let types = state.services.booking.list_types().await?;
    Ok(Json(types))
}
