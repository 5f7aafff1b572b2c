//! Users repository for database operations

use chrono::{NaiveDateTime, Utc};
use sqlx::{Executor, PgConnection, Pool, Postgres};

use crate::{
    error::{conflict_on_unique, AppError, AppResult},
    models::{
        appointment::Appointment,
        enums::{Role, Specialty},
        user::{NewUser, User, UserQuery, UserShort},
    },
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Get an active user holding the given role
    pub async fn get_with_role<'e, E>(&self, executor: E, id: i32, role: Role) -> AppResult<User>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE id = $1 AND role = $2 AND active = TRUE",
        )
        .bind(id)
        .bind(role)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} with id {} not found", capitalize(role.as_str()), id)))
    }

    /// Get user by email (case-insensitive)
    pub async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Check if email already exists
    pub async fn email_exists(&self, email: &str) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Create a user account
    pub async fn create(&self, user: &NewUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, phone, role, specialty)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone)
        .bind(user.role)
        .bind(user.specialty)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "Email already registered"))
    }

    /// List users, optionally filtered by role
    pub async fn list(&self, query: &UserQuery) -> AppResult<Vec<User>> {
        let include_inactive = query.include_inactive.unwrap_or(false);
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE ($1::text IS NULL OR role = $1)
              AND ($2 OR active = TRUE)
            ORDER BY last_name, first_name
            "#,
        )
        .bind(query.role)
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    /// Active doctors, optionally restricted to a specialty
    pub async fn list_doctors(&self, specialty: Option<Specialty>) -> AppResult<Vec<UserShort>> {
        let doctors = sqlx::query_as::<_, UserShort>(
            r#"
            SELECT id, first_name, last_name, role, specialty FROM users
            WHERE role = 'doctor' AND active = TRUE
              AND ($1::text IS NULL OR specialty = $1)
            ORDER BY last_name, first_name
            "#,
        )
        .bind(specialty)
        .fetch_all(&self.pool)
        .await?;
        Ok(doctors)
    }

    /// Email addresses of all active administrators
    pub async fn admin_emails(&self) -> AppResult<Vec<String>> {
        let emails: Vec<String> = sqlx::query_scalar(
            "SELECT email FROM users WHERE role = 'administrator' AND active = TRUE ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(emails)
    }

    /// Count active administrators
    pub async fn count_admins(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE role = 'administrator' AND active = TRUE",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Replace a user's password hash
    pub async fn update_password(&self, id: i32, password_hash: &str) -> AppResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3")
            .bind(password_hash)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }
        Ok(())
    }

    /// Lock an active patient row for the rest of the transaction
    pub async fn lock_patient(&self, conn: &mut PgConnection, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE id = $1 AND role = 'patient' AND active = TRUE FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Patient with id {} not found", id)))
    }

    /// Deactivate a user inside a transaction
    pub async fn deactivate(&self, conn: &mut PgConnection, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET active = FALSE, updated_at = $1 WHERE id = $2 RETURNING *",
        )
        .bind(Utc::now())
        .bind(id)
        .fetch_one(conn)
        .await
        .map_err(AppError::from)
    }

    /// Cancel every open appointment of a patient after `after`
    pub async fn cancel_future_appointments(
        &self,
        conn: &mut PgConnection,
        patient_id: i32,
        after: NaiveDateTime,
    ) -> AppResult<Vec<Appointment>> {
        let now = Utc::now();
        let cancelled = sqlx::query_as::<_, Appointment>(
            r#"
            UPDATE appointments
            SET status = 'cancelled', cancelled_at = $1, updated_at = $1
            WHERE patient_id = $2
              AND status IN ('pending', 'confirmed')
              AND scheduled_at > $3
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(patient_id)
        .bind(after)
        .fetch_all(conn)
        .await?;
        Ok(cancelled)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
