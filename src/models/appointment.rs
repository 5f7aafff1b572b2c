//! Appointment model, appointment types and the status state machine

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::enums::{AppointmentStatus, Specialty};
use crate::error::{AppError, AppResult};

/// Appointment model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Appointment {
    pub id: i32,
    pub patient_id: i32,
    pub doctor_id: i32,
    /// Clinic-local date and time of the slot
    #[schema(value_type = String, example = "2025-03-10T09:00:00")]
    pub scheduled_at: NaiveDateTime,
    pub status: AppointmentStatus,
    pub appointment_type_id: i32,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Appointment type and the specialty it requires
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AppointmentType {
    pub id: i32,
    pub name: String,
    /// Doctor specialty required to perform this type (None = any doctor)
    pub required_specialty: Option<Specialty>,
    pub description: Option<String>,
}

impl AppointmentType {
    /// Whether a doctor with the given specialty may take this appointment type
    pub fn accepts(&self, doctor_specialty: Option<Specialty>) -> bool {
        match self.required_specialty {
            None => true,
            Some(required) => doctor_specialty == Some(required),
        }
    }
}

/// Create appointment request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateAppointment {
    /// Patient to book for; defaults to the caller for patients
    pub patient_id: Option<i32>,
    pub doctor_id: i32,
    pub date: NaiveDate,
    #[schema(value_type = String, example = "09:00")]
    pub time: NaiveTime,
    pub appointment_type_id: i32,
    pub notes: Option<String>,
}

/// Patient reschedule request (date/time only)
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RescheduleAppointment {
    pub date: NaiveDate,
    #[schema(value_type = String, example = "10:30")]
    pub time: NaiveTime,
}

/// Administrative edit request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AdminUpdateAppointment {
    pub patient_id: Option<i32>,
    pub doctor_id: Option<i32>,
    pub date: Option<NaiveDate>,
    #[schema(value_type = Option<String>)]
    pub time: Option<NaiveTime>,
    pub appointment_type_id: Option<i32>,
    pub notes: Option<String>,
}

/// Fully resolved appointment fields, validated and ready to persist
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentDraft {
    pub patient_id: i32,
    pub doctor_id: i32,
    pub scheduled_at: NaiveDateTime,
    pub appointment_type_id: i32,
    pub notes: Option<String>,
}

/// Query parameters for doctor agenda
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct AppointmentQuery {
    /// Restrict to a single day (YYYY-MM-DD)
    pub date: Option<NaiveDate>,
}

impl AppointmentStatus {
    /// Whether the appointment still holds its slot
    pub fn is_open(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }

    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Confirmed, Completed) | (Pending, Cancelled) | (Confirmed, Cancelled)
        )
    }

    /// Validate a transition, returning the new status
    pub fn transition_to(&self, next: AppointmentStatus) -> AppResult<AppointmentStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(AppError::InvalidStateTransition(format!(
                "Cannot change appointment from {} to {}",
                self, next
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AppointmentStatus::*;

    #[test]
    fn test_happy_path_transitions() {
        assert_eq!(Pending.transition_to(Confirmed).unwrap(), Confirmed);
        assert_eq!(Confirmed.transition_to(Completed).unwrap(), Completed);
        assert_eq!(Pending.transition_to(Cancelled).unwrap(), Cancelled);
        assert_eq!(Confirmed.transition_to(Cancelled).unwrap(), Cancelled);
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [Cancelled, Completed] {
            for next in [Pending, Confirmed, Cancelled, Completed] {
                assert!(matches!(
                    terminal.transition_to(next),
                    Err(AppError::InvalidStateTransition(_))
                ));
            }
        }
    }

    #[test]
    fn test_cancel_twice_fails() {
        let status = Pending.transition_to(Cancelled).unwrap();
        assert!(matches!(
            status.transition_to(Cancelled),
            Err(AppError::InvalidStateTransition(_))
        ));
    }

    #[test]
    fn test_pending_cannot_complete_directly() {
        assert!(Pending.transition_to(Completed).is_err());
        assert!(Confirmed.transition_to(Pending).is_err());
    }

    #[test]
    fn test_type_specialty_lookup() {
        let root_canal = AppointmentType {
            id: 2,
            name: "Root canal".to_string(),
            required_specialty: Some(Specialty::Endodontics),
            description: None,
        };
        assert!(root_canal.accepts(Some(Specialty::Endodontics)));
        assert!(!root_canal.accepts(Some(Specialty::General)));
        assert!(!root_canal.accepts(None));

        let checkup = AppointmentType {
            required_specialty: None,
            ..root_canal
        };
        assert!(checkup.accepts(None));
    }
}
