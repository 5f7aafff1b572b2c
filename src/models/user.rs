//! User model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::{Role, Specialty};
use crate::error::AppError;

/// User model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Role,
    /// Only set for doctors
    pub specialty: Option<Specialty>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Short user representation for listings
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserShort {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub specialty: Option<Specialty>,
}

/// Patient self-registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterPatient {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,
    pub phone: Option<String>,
    /// CAPTCHA response token (required when CAPTCHA is enabled)
    pub captcha_token: Option<String>,
}

/// Staff account creation request (administrators only)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateStaff {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,
    pub phone: Option<String>,
    /// DOCTOR or ADMINISTRATOR
    pub role: Role,
    /// Required for doctors
    pub specialty: Option<Specialty>,
}

/// Account fields written on insert
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub specialty: Option<Specialty>,
}

/// Query parameters for user listings
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct UserQuery {
    /// Filter by role
    pub role: Option<Role>,
    /// Include deactivated accounts
    pub include_inactive: Option<bool>,
}

/// Query parameters for the public doctor directory
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct DoctorQuery {
    pub specialty: Option<Specialty>,
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i32,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Administrator
    }

    pub fn is_doctor(&self) -> bool {
        self.role == Role::Doctor
    }

    pub fn is_patient(&self) -> bool {
        self.role == Role::Patient
    }

    /// Require administrator privileges
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Administrator privileges required".to_string()))
        }
    }

    /// Require one of the given roles
    pub fn require_any(&self, roles: &[Role]) -> Result<(), AppError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Authorization(format!(
                "Role {} is not allowed to perform this action",
                self.role
            )))
        }
    }

    /// Require that the caller is the given user or an administrator
    pub fn require_self_or_admin(&self, user_id: i32) -> Result<(), AppError> {
        if self.is_admin() || self.user_id == user_id {
            Ok(())
        } else {
            Err(AppError::Authorization("Access to another user's data is not allowed".to_string()))
        }
    }

    /// Staff (doctors and administrators) may read any patient's clinical data
    pub fn require_staff_or_self(&self, patient_id: i32) -> Result<(), AppError> {
        if self.is_admin() || self.is_doctor() || self.user_id == patient_id {
            Ok(())
        } else {
            Err(AppError::Authorization("Access to another patient's data is not allowed".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: Role, user_id: i32) -> UserClaims {
        let now = Utc::now().timestamp();
        UserClaims {
            sub: "someone@example.com".to_string(),
            user_id,
            role,
            exp: now + 3600,
            iat: now,
        }
    }

    #[test]
    fn test_token_round_trip() {
        let original = claims(Role::Doctor, 7);
        let token = original.create_token("test-secret").unwrap();
        let decoded = UserClaims::from_token(&token, "test-secret").unwrap();
        assert_eq!(decoded.user_id, 7);
        assert_eq!(decoded.role, Role::Doctor);
        assert!(UserClaims::from_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_role_guards() {
        let patient = claims(Role::Patient, 3);
        assert!(patient.require_admin().is_err());
        assert!(patient.require_self_or_admin(3).is_ok());
        assert!(patient.require_self_or_admin(4).is_err());
        assert!(patient.require_staff_or_self(4).is_err());

        let doctor = claims(Role::Doctor, 9);
        assert!(doctor.require_staff_or_self(4).is_ok());
        assert!(doctor.require_any(&[Role::Doctor, Role::Administrator]).is_ok());

        let admin = claims(Role::Administrator, 1);
        assert!(admin.require_admin().is_ok());
        assert!(admin.require_self_or_admin(42).is_ok());
    }

    #[test]
    fn test_registration_validation() {
        let request = RegisterPatient {
            email: "not-an-email".to_string(),
            password: "short".to_string(),
            first_name: "Ana".to_string(),
            last_name: "Lopez".to_string(),
            phone: None,
            captcha_token: None,
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }
}
