//! Medical records repository

use chrono::{NaiveDate, Utc};
use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{conflict_on_unique, AppError, AppResult},
    models::{
        appointment::Appointment,
        medical_record::{CreateMedicalRecord, MedicalRecord},
    },
};

#[derive(Clone)]
pub struct MedicalRecordsRepository {
    pool: Pool<Postgres>,
}

impl MedicalRecordsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get medical record by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<MedicalRecord> {
        sqlx::query_as::<_, MedicalRecord>("SELECT * FROM medical_records WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Medical record with id {} not found", id)))
    }

    /// Insert the record of a completed appointment
    pub async fn insert(
        &self,
        conn: &mut PgConnection,
        appointment: &Appointment,
        record_date: NaiveDate,
        request: &CreateMedicalRecord,
    ) -> AppResult<MedicalRecord> {
        sqlx::query_as::<_, MedicalRecord>(
            r#"
            INSERT INTO medical_records (
                patient_id, doctor_id, appointment_id, record_date,
                diagnosis, treatment, notes, next_appointment_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(appointment.patient_id)
        .bind(appointment.doctor_id)
        .bind(appointment.id)
        .bind(record_date)
        .bind(request.diagnosis.trim())
        .bind(request.treatment.trim())
        .bind(&request.notes)
        .bind(request.next_appointment_date)
        .fetch_one(conn)
        .await
        .map_err(|e| {
            conflict_on_unique(
                e,
                &format!("Appointment {} already has a medical record", appointment.id),
            )
        })
    }

    /// Persist corrected clinical fields
    pub async fn update(&self, record: &MedicalRecord) -> AppResult<MedicalRecord> {
        sqlx::query_as::<_, MedicalRecord>(
            r#"
            UPDATE medical_records SET
                diagnosis = $1,
                treatment = $2,
                notes = $3,
                next_appointment_date = $4,
                updated_at = $5
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(&record.diagnosis)
        .bind(&record.treatment)
        .bind(&record.notes)
        .bind(record.next_appointment_date)
        .bind(Utc::now())
        .bind(record.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Medical record with id {} not found", record.id)))
    }

    /// Clinical history of a patient, most recent first
    pub async fn list_by_patient(&self, patient_id: i32) -> AppResult<Vec<MedicalRecord>> {
        let records = sqlx::query_as::<_, MedicalRecord>(
            r#"
            SELECT * FROM medical_records
            WHERE patient_id = $1
            ORDER BY record_date DESC, id DESC
            "#,
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}
