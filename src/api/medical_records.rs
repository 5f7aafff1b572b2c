//! Medical record endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::medical_record::{CreateMedicalRecord, MedicalRecord, UpdateMedicalRecord},
};

use super::AuthenticatedUser;

/// Record the consultation of a completed appointment
#[utoipa::path(
    post,
    path = "/medical-records",
    tag = "medical_records",
    security(("bearer_auth" = [])),
    request_body = CreateMedicalRecord,
    responses(
        (status = 201, description = "Record created", body = MedicalRecord),
        (status = 400, description = "Appointment not completed or invalid input", body = crate::error::ErrorResponse),
        (status = 409, description = "Appointment already recorded", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_record(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateMedicalRecord>,
) -> AppResult<(StatusCode, Json<MedicalRecord>)> {
    let record = state.services.medical_records.create(&claims, request).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Get a medical record
#[utoipa::path(
    get,
    path = "/medical-records/{id}",
    tag = "medical_records",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Record ID")
    ),
    responses(
        (status = 200, description = "Medical record", body = MedicalRecord),
        (status = 404, description = "Record not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_record(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<MedicalRecord>> {
    let record = state.services.medical_records.get(&claims, id).await?;
    Ok(Json(record))
}

/// Correct a medical record
#[utoipa::path(
    put,
    path = "/medical-records/{id}",
    tag = "medical_records",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Record ID")
    ),
    request_body = UpdateMedicalRecord,
    responses(
        (status = 200, description = "Record corrected", body = MedicalRecord),
        (status = 404, description = "Record not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_record(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateMedicalRecord>,
) -> AppResult<Json<MedicalRecord>> {
    claims.require_admin()?;

    let record = state.services.medical_records.correct(id, request).await?;
    Ok(Json(record))
}

/// Clinical history of a patient
#[utoipa::path(
    get,
    path = "/medical-records/patient/{id}",
    tag = "medical_records",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Patient ID")
    ),
    responses(
        (status = 200, description = "Patient records", body = Vec<MedicalRecord>),
        (status = 404, description = "Patient not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_patient_records(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(patient_id): Path<i32>,
) -> AppResult<Json<Vec<MedicalRecord>>> {
    claims.require_staff_or_self(patient_id)?;

    let records = state
        .services
        .medical_records
        .list_by_patient(patient_id)
        .await?;
    Ok(Json(records))
}
