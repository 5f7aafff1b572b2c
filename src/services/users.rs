//! Accounts, authentication and password recovery

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        appointment::Appointment,
        enums::{Role, Specialty},
        user::{CreateStaff, NewUser, RegisterPatient, User, UserClaims, UserQuery, UserShort},
    },
    repository::Repository,
    services::{
        captcha::CaptchaService,
        clinic_now,
        notifications::{Notification, NotificationService},
        redis::RedisService,
    },
};

/// Lifetime of a password reset code
const RESET_CODE_MINUTES: u64 = 15;

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9+\- ]{7,20}$").unwrap());

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: AuthConfig,
    redis: RedisService,
    captcha: CaptchaService,
    notifications: NotificationService,
}

impl UsersService {
    pub fn new(
        repository: Repository,
        config: AuthConfig,
        redis: RedisService,
        captcha: CaptchaService,
        notifications: NotificationService,
    ) -> Self {
        Self {
            repository,
            config,
            redis,
            captcha,
            notifications,
        }
    }

    /// Self-registration of a patient account
    pub async fn register_patient(&self, request: RegisterPatient) -> AppResult<User> {
        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        validate_phone(request.phone.as_deref())?;

        self.captcha.verify(request.captcha_token.as_deref()).await?;

        let email = normalize_email(&request.email);
        if self.repository.users.email_exists(&email).await? {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let user = self
            .repository
            .users
            .create(&NewUser {
                email,
                password_hash: hash_password(&request.password)?,
                first_name: request.first_name.trim().to_string(),
                last_name: request.last_name.trim().to_string(),
                phone: normalize_phone(request.phone),
                role: Role::Patient,
                specialty: None,
            })
            .await?;

        tracing::info!(user_id = user.id, "Patient registered");
        Ok(user)
    }

    /// Create a doctor or administrator account
    pub async fn create_staff(&self, request: CreateStaff) -> AppResult<User> {
        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        validate_phone(request.phone.as_deref())?;
        let specialty = staff_specialty(request.role, request.specialty)?;

        let email = normalize_email(&request.email);
        if self.repository.users.email_exists(&email).await? {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let user = self
            .repository
            .users
            .create(&NewUser {
                email,
                password_hash: hash_password(&request.password)?,
                first_name: request.first_name.trim().to_string(),
                last_name: request.last_name.trim().to_string(),
                phone: normalize_phone(request.phone),
                role: request.role,
                specialty,
            })
            .await?;

        tracing::info!(user_id = user.id, role = %user.role, "Staff account created");
        Ok(user)
    }

    /// Authenticate by email and password, returning a bearer token
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<(String, User)> {
        let invalid = || AppError::Authentication("Invalid email or password".to_string());

        let user = self
            .repository
            .users
            .get_by_email(email.trim())
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(&user.password_hash, password)? {
            return Err(invalid());
        }
        if !user.active {
            return Err(AppError::Authentication("Account is deactivated".to_string()));
        }

        let token = self.create_token_for_user(&user)?;
        tracing::debug!(user_id = user.id, "User authenticated");
        Ok((token, user))
    }

    fn create_token_for_user(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let claims = UserClaims {
            sub: user.email.clone(),
            user_id: user.id,
            role: user.role,
            exp: now + (self.config.jwt_expiration_hours as i64 * 3600),
            iat: now,
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Start password recovery. Unknown or inactive accounts are silently ignored.
    pub async fn forgot_password(&self, email: &str) -> AppResult<()> {
        let user = match self.repository.users.get_by_email(email.trim()).await? {
            Some(user) if user.active => user,
            _ => {
                tracing::debug!("Password reset requested for unknown account");
                return Ok(());
            }
        };

        let code = generate_reset_code();
        self.redis
            .store_reset_code(user.id, &code, RESET_CODE_MINUTES * 60)
            .await?;

        self.notifications.enqueue(Notification::PasswordReset {
            to: user.email.clone(),
            code,
            valid_minutes: RESET_CODE_MINUTES,
        });
        tracing::info!(user_id = user.id, "Password reset code issued");
        Ok(())
    }

    /// Complete password recovery with the emailed code
    pub async fn reset_password(&self, email: &str, code: &str, new_password: &str) -> AppResult<()> {
        if new_password.chars().count() < 8 {
            return Err(AppError::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        let invalid = || AppError::Validation("Invalid or expired reset code".to_string());
        let user = self
            .repository
            .users
            .get_by_email(email.trim())
            .await?
            .filter(|u| u.active)
            .ok_or_else(invalid)?;

        if !self.redis.consume_reset_code(user.id, code.trim()).await? {
            return Err(invalid());
        }

        self.repository
            .users
            .update_password(user.id, &hash_password(new_password)?)
            .await?;
        tracing::info!(user_id = user.id, "Password reset");
        Ok(())
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    /// List users
    pub async fn list(&self, query: &UserQuery) -> AppResult<Vec<User>> {
        self.repository.users.list(query).await
    }

    /// Public doctor directory
    pub async fn list_doctors(&self, specialty: Option<Specialty>) -> AppResult<Vec<UserShort>> {
        self.repository.users.list_doctors(specialty).await
    }

    /// Deactivate a patient and cancel their upcoming appointments
    pub async fn deactivate_patient(&self, id: i32) -> AppResult<(User, Vec<Appointment>)> {
        let mut tx = self.repository.pool.begin().await?;

        self.repository.users.lock_patient(&mut *tx, id).await?;
        let cancelled = self
            .repository
            .users
            .cancel_future_appointments(&mut *tx, id, clinic_now())
            .await?;
        let user = self.repository.users.deactivate(&mut *tx, id).await?;

        tx.commit().await?;

        tracing::info!(
            user_id = id,
            cancelled = cancelled.len(),
            "Patient deactivated"
        );
        Ok((user, cancelled))
    }

    /// Create the configured administrator when the clinic has none
    pub async fn ensure_bootstrap_admin(&self) -> AppResult<()> {
        let (Some(email), Some(password)) = (
            self.config.bootstrap_admin_email.as_deref(),
            self.config.bootstrap_admin_password.as_deref(),
        ) else {
            return Ok(());
        };

        if self.repository.users.count_admins().await? > 0 {
            return Ok(());
        }

        let admin = self
            .repository
            .users
            .create(&NewUser {
                email: normalize_email(email),
                password_hash: hash_password(password)?,
                first_name: "Clinic".to_string(),
                last_name: "Administrator".to_string(),
                phone: None,
                role: Role::Administrator,
                specialty: None,
            })
            .await?;
        tracing::warn!(user_id = admin.id, email = %admin.email, "Bootstrap administrator created");
        Ok(())
    }
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn generate_reset_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn normalize_phone(phone: Option<String>) -> Option<String> {
    phone
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
}

fn validate_phone(phone: Option<&str>) -> AppResult<()> {
    match phone.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) if !PHONE_RE.is_match(p) => Err(AppError::Validation(
            "Phone must be 7 to 20 digits, spaces, '+' or '-'".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Doctors need a specialty; administrators never carry one
fn staff_specialty(role: Role, specialty: Option<Specialty>) -> AppResult<Option<Specialty>> {
    match role {
        Role::Doctor => specialty
            .map(Some)
            .ok_or_else(|| AppError::Validation("Doctors require a specialty".to_string())),
        Role::Administrator => Ok(None),
        Role::Patient => Err(AppError::Validation(
            "Patients register through the public registration endpoint".to_string(),
        )),
    }
}
