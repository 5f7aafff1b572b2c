//! Medical history record model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Consultation record, one per completed appointment
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct MedicalRecord {
    pub id: i32,
    pub patient_id: i32,
    pub doctor_id: i32,
    pub appointment_id: i32,
    pub record_date: NaiveDate,
    pub diagnosis: String,
    pub treatment: String,
    pub notes: Option<String>,
    pub next_appointment_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create medical record request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateMedicalRecord {
    pub appointment_id: i32,
    #[validate(length(min = 1, message = "Diagnosis is required"))]
    pub diagnosis: String,
    #[validate(length(min = 1, message = "Treatment is required"))]
    pub treatment: String,
    pub notes: Option<String>,
    pub next_appointment_date: Option<NaiveDate>,
}

/// Administrative correction request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateMedicalRecord {
    #[validate(length(min = 1, message = "Diagnosis cannot be empty"))]
    pub diagnosis: Option<String>,
    #[validate(length(min = 1, message = "Treatment cannot be empty"))]
    pub treatment: Option<String>,
    pub notes: Option<String>,
    pub next_appointment_date: Option<NaiveDate>,
}
