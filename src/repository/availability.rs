//! Availability windows repository

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::{Executor, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        availability::{CreateAvailability, DoctorAvailability},
        enums::AvailabilityStatus,
    },
};

#[derive(Clone)]
pub struct AvailabilityRepository {
    pool: Pool<Postgres>,
}

impl AvailabilityRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get availability window by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<DoctorAvailability> {
        sqlx::query_as::<_, DoctorAvailability>("SELECT * FROM availability WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Availability window with id {} not found", id)))
    }

    /// All windows of a doctor, whatever their status
    pub async fn list_for_doctor<'e, E>(
        &self,
        executor: E,
        doctor_id: i32,
    ) -> AppResult<Vec<DoctorAvailability>>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let windows = sqlx::query_as::<_, DoctorAvailability>(
            r#"
            SELECT * FROM availability
            WHERE doctor_id = $1
            ORDER BY day_of_week, start_time
            "#,
        )
        .bind(doctor_id)
        .fetch_all(executor)
        .await?;
        Ok(windows)
    }

    /// Active windows of a doctor; exception periods are filtered per date by the resolver
    pub async fn list_active_for_doctor<'e, E>(
        &self,
        executor: E,
        doctor_id: i32,
    ) -> AppResult<Vec<DoctorAvailability>>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let windows = sqlx::query_as::<_, DoctorAvailability>(
            r#"
            SELECT * FROM availability
            WHERE doctor_id = $1 AND status = 'active'
            ORDER BY day_of_week, start_time
            "#,
        )
        .bind(doctor_id)
        .fetch_all(executor)
        .await?;
        Ok(windows)
    }

    /// Create a window; the request has already been validated
    pub async fn create(
        &self,
        request: &CreateAvailability,
        slot_interval_minutes: i32,
    ) -> AppResult<DoctorAvailability> {
        let window = sqlx::query_as::<_, DoctorAvailability>(
            r#"
            INSERT INTO availability (
                doctor_id, day_of_week, start_time, end_time, slot_interval_minutes,
                status, exception_start, exception_end, exception_reason
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(request.doctor_id)
        .bind(request.day_of_week)
        .bind(request.start_time)
        .bind(request.end_time)
        .bind(slot_interval_minutes)
        .bind(request.status.unwrap_or(AvailabilityStatus::Active))
        .bind(request.exception_start)
        .bind(request.exception_end)
        .bind(&request.exception_reason)
        .fetch_one(&self.pool)
        .await?;
        Ok(window)
    }

    /// Persist every editable field of a window
    pub async fn update(&self, window: &DoctorAvailability) -> AppResult<DoctorAvailability> {
        sqlx::query_as::<_, DoctorAvailability>(
            r#"
            UPDATE availability SET
                day_of_week = $1,
                start_time = $2,
                end_time = $3,
                slot_interval_minutes = $4,
                exception_start = $5,
                exception_end = $6,
                exception_reason = $7,
                updated_at = $8
            WHERE id = $9
            RETURNING *
            "#,
        )
        .bind(window.day_of_week)
        .bind(window.start_time)
        .bind(window.end_time)
        .bind(window.slot_interval_minutes)
        .bind(window.exception_start)
        .bind(window.exception_end)
        .bind(&window.exception_reason)
        .bind(Utc::now())
        .bind(window.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Availability window with id {} not found", window.id)))
    }

    /// Change window status
    pub async fn update_status(
        &self,
        id: i32,
        status: AvailabilityStatus,
    ) -> AppResult<DoctorAvailability> {
        sqlx::query_as::<_, DoctorAvailability>(
            "UPDATE availability SET status = $1, updated_at = $2 WHERE id = $3 RETURNING *",
        )
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Availability window with id {} not found", id)))
    }

    /// Whether a non-cancelled appointment of the window's doctor falls inside it.
    ///
    /// Postgres `EXTRACT(ISODOW ...)` is 1=Monday, the stored index is 0=Monday.
    pub async fn has_open_appointments(&self, window: &DoctorAvailability) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM appointments
                WHERE doctor_id = $1
                  AND status <> 'cancelled'
                  AND EXTRACT(ISODOW FROM scheduled_at)::int - 1 = $2
                  AND scheduled_at::time >= $3
                  AND scheduled_at::time < $4
            )
            "#,
        )
        .bind(window.doctor_id)
        .bind(window.day_of_week as i32)
        .bind(window.start_time)
        .bind(window.end_time)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Hard delete a window
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM availability WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Availability window with id {} not found", id)));
        }
        Ok(())
    }
}

/// Half-open timestamp range covering whole days `from..=to`
pub fn day_range(from: NaiveDate, to: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = from.and_time(NaiveTime::MIN);
    let end = match to.succ_opt() {
        Some(next) => next.and_time(NaiveTime::MIN),
        None => to.and_time(NaiveTime::MIN),
    };
    (start, end)
}
