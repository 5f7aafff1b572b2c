//! Medical history records

use chrono::NaiveDate;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        appointment::Appointment,
        enums::{AppointmentStatus, Role},
        medical_record::{CreateMedicalRecord, MedicalRecord, UpdateMedicalRecord},
        user::UserClaims,
    },
    repository::Repository,
};

/// Check that a record may be written for this appointment by this caller
fn check_recordable(claims: &UserClaims, appointment: &Appointment) -> AppResult<()> {
    if !(claims.is_admin() || (claims.is_doctor() && claims.user_id == appointment.doctor_id)) {
        return Err(AppError::Authorization(
            "Only the treating doctor or an administrator can record a consultation".to_string(),
        ));
    }
    if appointment.status != AppointmentStatus::Completed {
        return Err(AppError::Validation(format!(
            "Appointment {} is {}; only completed appointments get a medical record",
            appointment.id, appointment.status
        )));
    }
    Ok(())
}

fn check_next_date(next: Option<NaiveDate>, record_date: NaiveDate) -> AppResult<()> {
    match next {
        Some(next) if next <= record_date => Err(AppError::Validation(
            "next_appointment_date must be after the record date".to_string(),
        )),
        _ => Ok(()),
    }
}

#[derive(Clone)]
pub struct MedicalRecordsService {
    repository: Repository,
}

impl MedicalRecordsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Record the consultation of a completed appointment
    pub async fn create(&self, claims: &UserClaims, request: CreateMedicalRecord) -> AppResult<MedicalRecord> {
        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let mut tx = self.repository.pool.begin().await?;

        let appointment = self
            .repository
            .appointments
            .lock(&mut *tx, request.appointment_id)
            .await?;
        check_recordable(claims, &appointment)?;

        let record_date = appointment.scheduled_at.date();
        check_next_date(request.next_appointment_date, record_date)?;

        let record = self
            .repository
            .medical_records
            .insert(&mut *tx, &appointment, record_date, &request)
            .await?;
        tx.commit().await?;

        tracing::info!(
            record_id = record.id,
            appointment_id = appointment.id,
            patient_id = record.patient_id,
            "Medical record created"
        );
        Ok(record)
    }

    /// Administrative correction
    pub async fn correct(&self, id: i32, request: UpdateMedicalRecord) -> AppResult<MedicalRecord> {
        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let mut record = self.repository.medical_records.get_by_id(id).await?;
        if let Some(diagnosis) = request.diagnosis {
            record.diagnosis = diagnosis.trim().to_string();
        }
        if let Some(treatment) = request.treatment {
            record.treatment = treatment.trim().to_string();
        }
        if request.notes.is_some() {
            record.notes = request.notes;
        }
        if request.next_appointment_date.is_some() {
            check_next_date(request.next_appointment_date, record.record_date)?;
            record.next_appointment_date = request.next_appointment_date;
        }

        let record = self.repository.medical_records.update(&record).await?;
        tracing::info!(record_id = id, "Medical record corrected");
        Ok(record)
    }

    /// Get a record visible to the caller
    pub async fn get(&self, claims: &UserClaims, id: i32) -> AppResult<MedicalRecord> {
        let record = self.repository.medical_records.get_by_id(id).await?;
        claims.require_staff_or_self(record.patient_id)?;
        Ok(record)
    }

    /// Clinical history of a patient
    pub async fn list_by_patient(&self, patient_id: i32) -> AppResult<Vec<MedicalRecord>> {
        self.repository
            .users
            .get_with_role(&self.repository.pool, patient_id, Role::Patient)
            .await?;
        self.repository.medical_records.list_by_patient(patient_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn claims(role: Role, user_id: i32) -> UserClaims {
        UserClaims {
            sub: "staff@clinic.test".to_string(),
            user_id,
            role,
            exp: 0,
            iat: 0,
        }
    }

    fn appointment(status: AppointmentStatus) -> Appointment {
        Appointment {
            id: 5,
            patient_id: 3,
            doctor_id: 10,
            scheduled_at: NaiveDate::from_ymd_opt(2025, 3, 10)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            status,
            appointment_type_id: 1,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            cancelled_at: None,
        }
    }

    #[test]
    fn test_only_completed_appointments_are_recordable() {
        let doctor = claims(Role::Doctor, 10);
        assert!(check_recordable(&doctor, &appointment(AppointmentStatus::Completed)).is_ok());
        assert!(matches!(
            check_recordable(&doctor, &appointment(AppointmentStatus::Confirmed)),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_only_treating_doctor_or_admin_records() {
        let done = appointment(AppointmentStatus::Completed);
        assert!(check_recordable(&claims(Role::Doctor, 11), &done).is_err());
        assert!(check_recordable(&claims(Role::Patient, 3), &done).is_err());
        assert!(check_recordable(&claims(Role::Administrator, 1), &done).is_ok());
    }

    #[test]
    fn test_next_date_must_follow_record_date() {
        let record_date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        assert!(check_next_date(None, record_date).is_ok());
        assert!(check_next_date(Some(record_date), record_date).is_err());
        assert!(check_next_date(NaiveDate::from_ymd_opt(2025, 4, 10), record_date).is_ok());
    }
}
