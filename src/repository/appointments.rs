//! Appointments repository for database operations

use chrono::{NaiveDate, NaiveDateTime, Utc};
use sqlx::{Executor, PgConnection, Pool, Postgres};

use crate::{
    error::{on_unique, AppError, AppResult},
    models::{
        appointment::{Appointment, AppointmentDraft, AppointmentType},
        enums::AppointmentStatus,
        user::User,
    },
};

const SLOT_TAKEN: &str = "The requested slot is already booked for this doctor";

#[derive(Clone)]
pub struct AppointmentsRepository {
    pool: Pool<Postgres>,
}

impl AppointmentsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get appointment by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Appointment> {
        sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Appointment with id {} not found", id)))
    }

    /// Read an appointment and lock it until the transaction ends
    pub async fn lock(&self, conn: &mut PgConnection, id: i32) -> AppResult<Appointment> {
        sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Appointment with id {} not found", id)))
    }

    /// Lock an active doctor row; bookings for the same doctor queue up behind it
    pub async fn lock_doctor(&self, conn: &mut PgConnection, doctor_id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE id = $1 AND role = 'doctor' AND active = TRUE FOR UPDATE",
        )
        .bind(doctor_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Doctor with id {} not found", doctor_id)))
    }

    /// Start times of a doctor's non-cancelled appointments within `[from, to)`
    pub async fn occupied_slots<'e, E>(
        &self,
        executor: E,
        doctor_id: i32,
        from: NaiveDateTime,
        to: NaiveDateTime,
        exclude: Option<i32>,
    ) -> AppResult<Vec<NaiveDateTime>>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let slots: Vec<NaiveDateTime> = sqlx::query_scalar(
            r#"
            SELECT scheduled_at FROM appointments
            WHERE doctor_id = $1
              AND status <> 'cancelled'
              AND scheduled_at >= $2
              AND scheduled_at < $3
              AND ($4::int IS NULL OR id <> $4)
            ORDER BY scheduled_at
            "#,
        )
        .bind(doctor_id)
        .bind(from)
        .bind(to)
        .bind(exclude)
        .fetch_all(executor)
        .await?;
        Ok(slots)
    }

    /// Insert a new appointment
    pub async fn insert(
        &self,
        conn: &mut PgConnection,
        draft: &AppointmentDraft,
        status: AppointmentStatus,
    ) -> AppResult<Appointment> {
        sqlx::query_as::<_, Appointment>(
            r#"
            INSERT INTO appointments (patient_id, doctor_id, scheduled_at, status, appointment_type_id, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(draft.patient_id)
        .bind(draft.doctor_id)
        .bind(draft.scheduled_at)
        .bind(status)
        .bind(draft.appointment_type_id)
        .bind(&draft.notes)
        .fetch_one(conn)
        .await
        .map_err(|e| on_unique(e, || AppError::SlotUnavailable(SLOT_TAKEN.to_string())))
    }

    /// Rewrite the assignment (patient, doctor, slot, type, notes) of an appointment
    pub async fn update_assignment(
        &self,
        conn: &mut PgConnection,
        id: i32,
        draft: &AppointmentDraft,
    ) -> AppResult<Appointment> {
        sqlx::query_as::<_, Appointment>(
            r#"
            UPDATE appointments SET
                patient_id = $1,
                doctor_id = $2,
                scheduled_at = $3,
                appointment_type_id = $4,
                notes = $5,
                updated_at = $6
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(draft.patient_id)
        .bind(draft.doctor_id)
        .bind(draft.scheduled_at)
        .bind(draft.appointment_type_id)
        .bind(&draft.notes)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(conn)
        .await
        .map_err(|e| on_unique(e, || AppError::SlotUnavailable(SLOT_TAKEN.to_string())))
    }

    /// Store a new status; cancellation also stamps `cancelled_at`
    pub async fn set_status(
        &self,
        conn: &mut PgConnection,
        id: i32,
        status: AppointmentStatus,
    ) -> AppResult<Appointment> {
        let now = Utc::now();
        let cancelled_at = (status == AppointmentStatus::Cancelled).then_some(now);
        let appointment = sqlx::query_as::<_, Appointment>(
            r#"
            UPDATE appointments SET
                status = $1,
                cancelled_at = COALESCE($2, cancelled_at),
                updated_at = $3
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(status)
        .bind(cancelled_at)
        .bind(now)
        .bind(id)
        .fetch_one(conn)
        .await?;
        Ok(appointment)
    }

    /// All appointments of a patient, most recent first
    pub async fn list_by_patient(&self, patient_id: i32) -> AppResult<Vec<Appointment>> {
        let appointments = sqlx::query_as::<_, Appointment>(
            "SELECT * FROM appointments WHERE patient_id = $1 ORDER BY scheduled_at DESC",
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(appointments)
    }

    /// A doctor's agenda, optionally restricted to one day
    pub async fn list_by_doctor(
        &self,
        doctor_id: i32,
        date: Option<NaiveDate>,
    ) -> AppResult<Vec<Appointment>> {
        let appointments = sqlx::query_as::<_, Appointment>(
            r#"
            SELECT * FROM appointments
            WHERE doctor_id = $1
              AND ($2::date IS NULL OR scheduled_at::date = $2)
            ORDER BY scheduled_at
            "#,
        )
        .bind(doctor_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(appointments)
    }

    /// Get appointment type by ID
    pub async fn get_type<'e, E>(&self, executor: E, id: i32) -> AppResult<AppointmentType>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, AppointmentType>("SELECT * FROM appointment_types WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Appointment type with id {} not found", id)))
    }

    /// All appointment types
    pub async fn list_types(&self) -> AppResult<Vec<AppointmentType>> {
        let types = sqlx::query_as::<_, AppointmentType>("SELECT * FROM appointment_types ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(types)
    }
}
