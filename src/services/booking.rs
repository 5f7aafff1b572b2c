//! Appointment booking: creation, rescheduling and status transitions

use chrono::NaiveDateTime;
use sqlx::PgConnection;

use crate::{
    config::ClinicConfig,
    error::{AppError, AppResult},
    models::{
        appointment::{
            AdminUpdateAppointment, Appointment, AppointmentDraft, AppointmentType,
            CreateAppointment, RescheduleAppointment,
        },
        availability::DoctorAvailability,
        enums::{AppointmentStatus, Role},
        user::{User, UserClaims},
    },
    repository::{availability::day_range, Repository},
    services::{
        availability::{slots_on, BusinessHours},
        clinic_now,
        notifications::{Notification, NotificationService},
    },
};

/// Patient and doctor of a booking must be different users
fn require_distinct(patient_id: i32, doctor_id: i32) -> AppResult<()> {
    if patient_id == doctor_id {
        return Err(AppError::Validation(
            "Patient and doctor must be different users".to_string(),
        ));
    }
    Ok(())
}

/// Validate a requested slot.
///
/// `occupied` must already exclude the appointment being rescheduled.
pub fn validate_slot(
    patient_id: i32,
    doctor_id: i32,
    scheduled_at: NaiveDateTime,
    windows: &[DoctorAvailability],
    occupied: &[NaiveDateTime],
    hours: BusinessHours,
    now: NaiveDateTime,
) -> AppResult<()> {
    require_distinct(patient_id, doctor_id)?;
    if scheduled_at <= now {
        return Err(AppError::Validation(
            "Appointment must be scheduled in the future".to_string(),
        ));
    }
    if !hours.is_business_day(scheduled_at.date()) {
        return Err(AppError::Validation(
            "Appointments are only available Monday to Friday".to_string(),
        ));
    }
    if !hours.is_open_at(scheduled_at.time()) {
        return Err(AppError::Validation(format!(
            "Appointments must be between {:02}:00 and {:02}:00",
            hours.opening_hour, hours.closing_hour
        )));
    }
    if !slots_on(windows, scheduled_at.date(), None).contains(&scheduled_at) {
        return Err(AppError::Validation(
            "The doctor is not available at the requested time".to_string(),
        ));
    }
    if occupied.contains(&scheduled_at) {
        return Err(AppError::SlotUnavailable(
            "The requested slot is already booked for this doctor".to_string(),
        ));
    }
    Ok(())
}

/// Caller may see or act on the appointment as its patient, its doctor or an administrator
fn require_participant(claims: &UserClaims, appointment: &Appointment) -> AppResult<()> {
    if claims.is_admin()
        || (claims.is_patient() && claims.user_id == appointment.patient_id)
        || (claims.is_doctor() && claims.user_id == appointment.doctor_id)
    {
        Ok(())
    } else {
        Err(AppError::Authorization(
            "You are not a participant of this appointment".to_string(),
        ))
    }
}

/// Only the appointment's doctor or an administrator
fn require_treating_staff(claims: &UserClaims, appointment: &Appointment) -> AppResult<()> {
    if claims.is_admin() || (claims.is_doctor() && claims.user_id == appointment.doctor_id) {
        Ok(())
    } else {
        Err(AppError::Authorization(
            "Only the assigned doctor or an administrator can do this".to_string(),
        ))
    }
}

fn require_open(appointment: &Appointment) -> AppResult<()> {
    if appointment.status.is_open() {
        Ok(())
    } else {
        Err(AppError::InvalidStateTransition(format!(
            "Appointment {} is {} and can no longer be changed",
            appointment.id, appointment.status
        )))
    }
}

/// Participants of a booking as loaded inside the transaction
struct Parties {
    patient: User,
    doctor: User,
}

#[derive(Clone)]
pub struct BookingService {
    repository: Repository,
    hours: BusinessHours,
    notifications: NotificationService,
}

impl BookingService {
    pub fn new(repository: Repository, clinic: &ClinicConfig, notifications: NotificationService) -> Self {
        Self {
            repository,
            hours: BusinessHours::from(clinic),
            notifications,
        }
    }

    /// Load parties, check the type and validate the slot under the doctor lock
    async fn check_draft(
        &self,
        conn: &mut PgConnection,
        draft: &AppointmentDraft,
        exclude: Option<i32>,
    ) -> AppResult<Parties> {
        require_distinct(draft.patient_id, draft.doctor_id)?;
        let doctor = self
            .repository
            .appointments
            .lock_doctor(&mut *conn, draft.doctor_id)
            .await?;
        let patient = self
            .repository
            .users
            .get_with_role(&mut *conn, draft.patient_id, Role::Patient)
            .await?;

        let appointment_type: AppointmentType = self
            .repository
            .appointments
            .get_type(&mut *conn, draft.appointment_type_id)
            .await?;
        if !appointment_type.accepts(doctor.specialty) {
            return Err(AppError::Validation(format!(
                "'{}' requires a doctor specialized in {}",
                appointment_type.name,
                appointment_type
                    .required_specialty
                    .map(|s| s.to_string())
                    .unwrap_or_default()
            )));
        }

        let windows = self
            .repository
            .availability
            .list_active_for_doctor(&mut *conn, draft.doctor_id)
            .await?;
        let date = draft.scheduled_at.date();
        let (start, end) = day_range(date, date);
        let occupied = self
            .repository
            .appointments
            .occupied_slots(&mut *conn, draft.doctor_id, start, end, exclude)
            .await?;

        validate_slot(
            draft.patient_id,
            draft.doctor_id,
            draft.scheduled_at,
            &windows,
            &occupied,
            self.hours,
            clinic_now(),
        )?;

        Ok(Parties { patient, doctor })
    }

    /// Book an appointment
    pub async fn create(&self, claims: &UserClaims, request: CreateAppointment) -> AppResult<Appointment> {
        let (patient_id, status) = match claims.role {
            Role::Patient => {
                if request.patient_id.map_or(false, |id| id != claims.user_id) {
                    return Err(AppError::Authorization(
                        "Patients can only book for themselves".to_string(),
                    ));
                }
                (claims.user_id, AppointmentStatus::Pending)
            }
            Role::Administrator => {
                let patient_id = request.patient_id.ok_or_else(|| {
                    AppError::Validation("patient_id is required".to_string())
                })?;
                (patient_id, AppointmentStatus::Confirmed)
            }
            Role::Doctor => {
                return Err(AppError::Authorization(
                    "Doctors cannot book appointments".to_string(),
                ))
            }
        };

        let draft = AppointmentDraft {
            patient_id,
            doctor_id: request.doctor_id,
            scheduled_at: request.date.and_time(request.time),
            appointment_type_id: request.appointment_type_id,
            notes: request.notes,
        };

        let mut tx = self.repository.pool.begin().await?;
        let parties = self.check_draft(&mut *tx, &draft, None).await?;
        let appointment = self
            .repository
            .appointments
            .insert(&mut *tx, &draft, status)
            .await?;
        tx.commit().await?;

        tracing::info!(
            appointment_id = appointment.id,
            doctor_id = appointment.doctor_id,
            patient_id = appointment.patient_id,
            scheduled_at = %appointment.scheduled_at,
            status = %appointment.status,
            "Appointment booked"
        );

        self.notifications.enqueue(Notification::AppointmentBooked {
            to: parties.patient.email.clone(),
            patient_name: parties.patient.full_name(),
            doctor_name: parties.doctor.full_name(),
            scheduled_at: appointment.scheduled_at,
        });

        Ok(appointment)
    }

    /// Patient moves their own appointment to another slot
    pub async fn reschedule(
        &self,
        claims: &UserClaims,
        id: i32,
        request: RescheduleAppointment,
    ) -> AppResult<Appointment> {
        let mut tx = self.repository.pool.begin().await?;

        let current = self.repository.appointments.lock(&mut *tx, id).await?;
        if !(claims.is_patient() && current.patient_id == claims.user_id) {
            return Err(AppError::Authorization(
                "Only the patient who booked the appointment can reschedule it".to_string(),
            ));
        }
        require_open(&current)?;

        let draft = AppointmentDraft {
            scheduled_at: request.date.and_time(request.time),
            ..draft_of(&current)
        };
        let parties = self.check_draft(&mut *tx, &draft, Some(id)).await?;
        let updated = self
            .repository
            .appointments
            .update_assignment(&mut *tx, id, &draft)
            .await?;
        tx.commit().await?;

        tracing::info!(
            appointment_id = id,
            from = %current.scheduled_at,
            to = %updated.scheduled_at,
            "Appointment rescheduled"
        );
        self.notify_rescheduled(&parties, &current, &updated);
        Ok(updated)
    }

    /// Administrative edit of patient, doctor, slot, type or notes
    pub async fn admin_update(&self, id: i32, request: AdminUpdateAppointment) -> AppResult<Appointment> {
        let mut tx = self.repository.pool.begin().await?;

        let current = self.repository.appointments.lock(&mut *tx, id).await?;
        require_open(&current)?;

        let base = draft_of(&current);
        let date = request.date.unwrap_or(current.scheduled_at.date());
        let time = request.time.unwrap_or(current.scheduled_at.time());
        let draft = AppointmentDraft {
            patient_id: request.patient_id.unwrap_or(base.patient_id),
            doctor_id: request.doctor_id.unwrap_or(base.doctor_id),
            scheduled_at: date.and_time(time),
            appointment_type_id: request.appointment_type_id.unwrap_or(base.appointment_type_id),
            notes: request.notes.or(base.notes),
        };

        let parties = self.check_draft(&mut *tx, &draft, Some(id)).await?;
        let updated = self
            .repository
            .appointments
            .update_assignment(&mut *tx, id, &draft)
            .await?;
        tx.commit().await?;

        tracing::info!(appointment_id = id, "Appointment updated by administrator");
        if updated.scheduled_at != current.scheduled_at || updated.doctor_id != current.doctor_id {
            self.notify_rescheduled(&parties, &current, &updated);
        }
        Ok(updated)
    }

    fn notify_rescheduled(&self, parties: &Parties, previous: &Appointment, updated: &Appointment) {
        self.notifications.enqueue(Notification::AppointmentRescheduled {
            to: parties.patient.email.clone(),
            patient_name: parties.patient.full_name(),
            doctor_name: parties.doctor.full_name(),
            previous: previous.scheduled_at,
            scheduled_at: updated.scheduled_at,
        });
    }

    /// Apply a status transition under row lock
    async fn transition(
        &self,
        id: i32,
        next: AppointmentStatus,
        authorize: impl Fn(&Appointment) -> AppResult<()>,
    ) -> AppResult<Appointment> {
        let mut tx = self.repository.pool.begin().await?;

        let current = self.repository.appointments.lock(&mut *tx, id).await?;
        authorize(&current)?;
        let status = current.status.transition_to(next)?;
        let updated = self
            .repository
            .appointments
            .set_status(&mut *tx, id, status)
            .await?;
        tx.commit().await?;

        tracing::info!(
            appointment_id = id,
            from = %current.status,
            to = %updated.status,
            "Appointment status changed"
        );
        Ok(updated)
    }

    /// Cancel a pending or confirmed appointment
    pub async fn cancel(&self, claims: &UserClaims, id: i32) -> AppResult<Appointment> {
        let cancelled = self
            .transition(id, AppointmentStatus::Cancelled, |a| require_participant(claims, a))
            .await?;

        match self.load_parties(&cancelled).await {
            Ok(parties) => self.notifications.enqueue(Notification::AppointmentCancelled {
                to: parties.patient.email.clone(),
                patient_name: parties.patient.full_name(),
                doctor_name: parties.doctor.full_name(),
                scheduled_at: cancelled.scheduled_at,
            }),
            Err(e) => tracing::warn!(appointment_id = id, error = %e, "Cancellation notice skipped"),
        }
        Ok(cancelled)
    }

    /// PENDING -> CONFIRMED
    pub async fn confirm(&self, claims: &UserClaims, id: i32) -> AppResult<Appointment> {
        self.transition(id, AppointmentStatus::Confirmed, |a| require_treating_staff(claims, a))
            .await
    }

    /// CONFIRMED -> COMPLETED
    pub async fn complete(&self, claims: &UserClaims, id: i32) -> AppResult<Appointment> {
        self.transition(id, AppointmentStatus::Completed, |a| require_treating_staff(claims, a))
            .await
    }

    async fn load_parties(&self, appointment: &Appointment) -> AppResult<Parties> {
        Ok(Parties {
            patient: self.repository.users.get_by_id(appointment.patient_id).await?,
            doctor: self.repository.users.get_by_id(appointment.doctor_id).await?,
        })
    }

    /// Get an appointment visible to the caller
    pub async fn get(&self, claims: &UserClaims, id: i32) -> AppResult<Appointment> {
        let appointment = self.repository.appointments.get_by_id(id).await?;
        require_participant(claims, &appointment)?;
        Ok(appointment)
    }

    /// Appointments of a patient
    pub async fn list_by_patient(&self, patient_id: i32) -> AppResult<Vec<Appointment>> {
        self.repository.appointments.list_by_patient(patient_id).await
    }

    /// Agenda of a doctor
    pub async fn list_by_doctor(
        &self,
        doctor_id: i32,
        date: Option<chrono::NaiveDate>,
    ) -> AppResult<Vec<Appointment>> {
        self.repository
            .users
            .get_with_role(&self.repository.pool, doctor_id, Role::Doctor)
            .await?;
        self.repository.appointments.list_by_doctor(doctor_id, date).await
    }

    /// Appointment type catalogue
    pub async fn list_types(&self) -> AppResult<Vec<AppointmentType>> {
        self.repository.appointments.list_types().await
    }
}

fn draft_of(appointment: &Appointment) -> AppointmentDraft {
    AppointmentDraft {
        patient_id: appointment.patient_id,
        doctor_id: appointment.doctor_id,
        scheduled_at: appointment.scheduled_at,
        appointment_type_id: appointment.appointment_type_id,
        notes: appointment.notes.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::AvailabilityStatus;
    use chrono::{NaiveDate, NaiveTime, Utc};

    const PATIENT: i32 = 3;
    const DOCTOR: i32 = 10;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn hours() -> BusinessHours {
        BusinessHours {
            opening_hour: 8,
            closing_hour: 18,
        }
    }

    fn window(day_of_week: i16, start: u32, end: u32) -> DoctorAvailability {
        DoctorAvailability {
            id: 1,
            doctor_id: DOCTOR,
            day_of_week,
            start_time: NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
            slot_interval_minutes: 30,
            status: AvailabilityStatus::Active,
            exception_start: None,
            exception_end: None,
            exception_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn now() -> NaiveDateTime {
        at(2025, 3, 1, 12, 0)
    }

    fn claims(role: Role, user_id: i32) -> UserClaims {
        UserClaims {
            sub: "user@example.com".to_string(),
            user_id,
            role,
            exp: 0,
            iat: 0,
        }
    }

    fn appointment(status: AppointmentStatus) -> Appointment {
        Appointment {
            id: 1,
            patient_id: PATIENT,
            doctor_id: DOCTOR,
            scheduled_at: at(2025, 3, 10, 9, 0),
            status,
            appointment_type_id: 1,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            cancelled_at: None,
        }
    }

    #[test]
    fn test_monday_slot_inside_window_is_accepted() {
        let windows = vec![window(0, 8, 12)];
        let result = validate_slot(PATIENT, DOCTOR, at(2025, 3, 10, 9, 0), &windows, &[], hours(), now());
        assert!(result.is_ok());
    }

    #[test]
    fn test_same_slot_twice_is_unavailable() {
        let windows = vec![window(0, 8, 12)];
        let occupied = vec![at(2025, 3, 10, 9, 0)];
        let result = validate_slot(PATIENT, DOCTOR, at(2025, 3, 10, 9, 0), &windows, &occupied, hours(), now());
        assert!(matches!(result, Err(AppError::SlotUnavailable(_))));
    }

    #[test]
    fn test_admin_self_booking_is_a_validation_error() {
        let draft = AppointmentDraft {
            patient_id: 1,
            doctor_id: 1,
            scheduled_at: at(2025, 3, 10, 9, 0),
            appointment_type_id: 1,
            notes: None,
        };
        assert!(matches!(
            require_distinct(draft.patient_id, draft.doctor_id),
            Err(AppError::Validation(_))
        ));
        assert!(require_distinct(PATIENT, DOCTOR).is_ok());
    }

    #[test]
    fn test_saturday_is_rejected() {
        let windows = vec![window(5, 8, 12)];
        let result = validate_slot(PATIENT, DOCTOR, at(2025, 3, 15, 9, 0), &windows, &[], hours(), now());
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_past_and_self_booking_are_rejected() {
        let windows = vec![window(0, 8, 12)];
        let past = validate_slot(PATIENT, DOCTOR, at(2025, 3, 10, 9, 0), &windows, &[], hours(), at(2025, 3, 10, 9, 0));
        assert!(matches!(past, Err(AppError::Validation(_))));

        let same = validate_slot(DOCTOR, DOCTOR, at(2025, 3, 10, 9, 0), &windows, &[], hours(), now());
        assert!(matches!(same, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_business_hours_apply_even_inside_window() {
        let windows = vec![window(0, 6, 20)];
        let early = validate_slot(PATIENT, DOCTOR, at(2025, 3, 10, 7, 30), &windows, &[], hours(), now());
        let late = validate_slot(PATIENT, DOCTOR, at(2025, 3, 10, 18, 0), &windows, &[], hours(), now());
        let last = validate_slot(PATIENT, DOCTOR, at(2025, 3, 10, 17, 30), &windows, &[], hours(), now());
        assert!(early.is_err());
        assert!(late.is_err());
        assert!(last.is_ok());
    }

    #[test]
    fn test_slot_must_align_with_window() {
        let windows = vec![window(0, 8, 12)];
        let off_grid = validate_slot(PATIENT, DOCTOR, at(2025, 3, 10, 9, 10), &windows, &[], hours(), now());
        let outside = validate_slot(PATIENT, DOCTOR, at(2025, 3, 10, 14, 0), &windows, &[], hours(), now());
        let last_fitting = validate_slot(PATIENT, DOCTOR, at(2025, 3, 10, 11, 30), &windows, &[], hours(), now());
        assert!(matches!(off_grid, Err(AppError::Validation(_))));
        assert!(matches!(outside, Err(AppError::Validation(_))));
        assert!(last_fitting.is_ok());
    }

    #[test]
    fn test_participant_rules() {
        let appt = appointment(AppointmentStatus::Pending);
        assert!(require_participant(&claims(Role::Patient, PATIENT), &appt).is_ok());
        assert!(require_participant(&claims(Role::Patient, 99), &appt).is_err());
        assert!(require_participant(&claims(Role::Doctor, DOCTOR), &appt).is_ok());
        assert!(require_participant(&claims(Role::Doctor, 11), &appt).is_err());
        assert!(require_participant(&claims(Role::Administrator, 1), &appt).is_ok());

        assert!(require_treating_staff(&claims(Role::Patient, PATIENT), &appt).is_err());
        assert!(require_treating_staff(&claims(Role::Doctor, DOCTOR), &appt).is_ok());
    }

    #[test]
    fn test_closed_appointments_cannot_be_edited() {
        assert!(require_open(&appointment(AppointmentStatus::Confirmed)).is_ok());
        assert!(matches!(
            require_open(&appointment(AppointmentStatus::Cancelled)),
            Err(AppError::InvalidStateTransition(_))
        ));
        assert!(require_open(&appointment(AppointmentStatus::Completed)).is_err());
    }
}
