//! Doctor availability models (weekly windows, resolved slots)

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::enums::AvailabilityStatus;

/// Day-of-week index used in storage (0=Monday, 6=Sunday)
pub fn weekday_index(date: NaiveDate) -> i16 {
    date.weekday().num_days_from_monday() as i16
}

// ---------------------------------------------------------------------------
// DoctorAvailability
// ---------------------------------------------------------------------------

/// A recurring weekly window during which a doctor accepts appointments
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct DoctorAvailability {
    pub id: i32,
    pub doctor_id: i32,
    /// Day of week (0=Monday, 6=Sunday)
    pub day_of_week: i16,
    #[schema(value_type = String, example = "08:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "12:00:00")]
    pub end_time: NaiveTime,
    /// Spacing between bookable slots
    pub slot_interval_minutes: i32,
    pub status: AvailabilityStatus,
    /// First day of an exception period (e.g. vacation)
    pub exception_start: Option<NaiveDate>,
    /// Last day of an exception period (inclusive)
    pub exception_end: Option<NaiveDate>,
    pub exception_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DoctorAvailability {
    /// Whether the exception period of this window covers the given date
    pub fn exception_covers(&self, date: NaiveDate) -> bool {
        match (self.exception_start, self.exception_end) {
            (Some(start), Some(end)) => start <= date && date <= end,
            (Some(start), None) => start <= date,
            (None, Some(end)) => date <= end,
            (None, None) => false,
        }
    }

    /// Whether this window contributes slots on the given date
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        self.status == AvailabilityStatus::Active
            && self.day_of_week == weekday_index(date)
            && !self.exception_covers(date)
    }

    /// Whether a time of day falls inside the window
    pub fn contains_time(&self, time: NaiveTime) -> bool {
        self.start_time <= time && time < self.end_time
    }
}

/// Create availability window request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateAvailability {
    pub doctor_id: i32,
    /// Day of week (0=Monday, 6=Sunday)
    pub day_of_week: i16,
    #[schema(value_type = String, example = "08:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "12:00")]
    pub end_time: NaiveTime,
    /// Defaults to the clinic slot interval
    pub slot_interval_minutes: Option<i32>,
    pub status: Option<AvailabilityStatus>,
    pub exception_start: Option<NaiveDate>,
    pub exception_end: Option<NaiveDate>,
    pub exception_reason: Option<String>,
}

/// Update availability window request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateAvailability {
    pub day_of_week: Option<i16>,
    #[schema(value_type = Option<String>)]
    pub start_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>)]
    pub end_time: Option<NaiveTime>,
    pub slot_interval_minutes: Option<i32>,
    pub exception_start: Option<NaiveDate>,
    pub exception_end: Option<NaiveDate>,
    pub exception_reason: Option<String>,
    /// Remove the exception period
    #[serde(default)]
    pub clear_exception: bool,
}

/// Change availability status request
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAvailabilityStatus {
    pub status: AvailabilityStatus,
}

// ---------------------------------------------------------------------------
// Resolved slots
// ---------------------------------------------------------------------------

/// A concrete bookable slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AvailableSlot {
    pub date: NaiveDate,
    #[schema(value_type = String, example = "09:30:00")]
    pub time: NaiveTime,
    pub available: bool,
}

/// Open slots of one calendar day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DaySlots {
    pub date: NaiveDate,
    pub slots: Vec<AvailableSlot>,
}

/// Query parameters for slot resolution
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct AvailabilityQuery {
    /// First date (YYYY-MM-DD)
    pub from: NaiveDate,
    /// Last date, inclusive (YYYY-MM-DD)
    pub to: NaiveDate,
    /// Override of the per-window slot interval
    pub slot_minutes: Option<i32>,
}
