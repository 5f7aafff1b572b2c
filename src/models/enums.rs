//! Shared domain enums
//!
//! Enums are stored as lowercase snake_case TEXT columns and exchanged over
//! the API in SCREAMING_SNAKE_CASE.

use serde::{Deserialize, Serialize};
use sqlx::{
    encode::IsNull,
    error::BoxDynError,
    postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef},
    Decode, Encode, Postgres,
};
use utoipa::ToSchema;

/// Implements string conversions and TEXT column mapping for a fieldless enum
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($name), s)),
                }
            }
        }

        impl sqlx::Type<Postgres> for $name {
            fn type_info() -> PgTypeInfo {
                <String as sqlx::Type<Postgres>>::type_info()
            }

            fn compatible(ty: &PgTypeInfo) -> bool {
                <String as sqlx::Type<Postgres>>::compatible(ty)
            }
        }

        impl<'r> Decode<'r, Postgres> for $name {
            fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
                let s: String = Decode::<Postgres>::decode(value)?;
                s.parse().map_err(|e: String| e.into())
            }
        }

        impl Encode<'_, Postgres> for $name {
            fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> IsNull {
                <&str as Encode<Postgres>>::encode(self.as_str(), buf)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Account role carried in the bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Patient,
    Doctor,
    Administrator,
}

text_enum!(Role {
    Patient => "patient",
    Doctor => "doctor",
    Administrator => "administrator",
});

// ---------------------------------------------------------------------------
// Specialty
// ---------------------------------------------------------------------------

/// Dental specialty of a doctor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Specialty {
    General,
    Orthodontics,
    Endodontics,
    Periodontics,
    Prosthodontics,
    OralSurgery,
    Pediatric,
}

text_enum!(Specialty {
    General => "general",
    Orthodontics => "orthodontics",
    Endodontics => "endodontics",
    Periodontics => "periodontics",
    Prosthodontics => "prosthodontics",
    OralSurgery => "oral_surgery",
    Pediatric => "pediatric",
});

// ---------------------------------------------------------------------------
// AvailabilityStatus
// ---------------------------------------------------------------------------

/// Status of a doctor availability window; only `Active` windows produce slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AvailabilityStatus {
    Active,
    OnLeave,
    Permit,
    SickLeave,
    Training,
}

text_enum!(AvailabilityStatus {
    Active => "active",
    OnLeave => "on_leave",
    Permit => "permit",
    SickLeave => "sick_leave",
    Training => "training",
});

// ---------------------------------------------------------------------------
// AppointmentStatus
// ---------------------------------------------------------------------------

/// Appointment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

text_enum!(AppointmentStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Cancelled => "cancelled",
    Completed => "completed",
});

// ---------------------------------------------------------------------------
// InventoryType
// ---------------------------------------------------------------------------

/// Kind of stock item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InventoryType {
    Consumable,
    Instrument,
    Medication,
    Equipment,
    ProtectiveGear,
}

text_enum!(InventoryType {
    Consumable => "consumable",
    Instrument => "instrument",
    Medication => "medication",
    Equipment => "equipment",
    ProtectiveGear => "protective_gear",
});

// ---------------------------------------------------------------------------
// InventoryStatus
// ---------------------------------------------------------------------------

/// Stock status. `Damaged` and `Deleted` are administrative overrides, the
/// others are derived from quantity and expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InventoryStatus {
    Available,
    LowStock,
    OutOfStock,
    Expired,
    Damaged,
    Deleted,
}

text_enum!(InventoryStatus {
    Available => "available",
    LowStock => "low_stock",
    OutOfStock => "out_of_stock",
    Expired => "expired",
    Damaged => "damaged",
    Deleted => "deleted",
});

impl InventoryStatus {
    /// Whether this status was set by an administrator rather than derived
    pub fn is_override(&self) -> bool {
        matches!(self, InventoryStatus::Damaged | InventoryStatus::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_round_trip_is_case_insensitive() {
        assert_eq!("LOW_STOCK".parse::<InventoryStatus>(), Ok(InventoryStatus::LowStock));
        assert_eq!("on_leave".parse::<AvailabilityStatus>(), Ok(AvailabilityStatus::OnLeave));
        assert_eq!(Specialty::OralSurgery.as_str(), "oral_surgery");
        assert!("dentist".parse::<Role>().is_err());
    }

    #[test]
    fn test_api_representation() {
        let json = serde_json::to_string(&AppointmentStatus::Pending).unwrap();
        assert_eq!(json, "\"PENDING\"");
        let status: InventoryStatus = serde_json::from_str("\"OUT_OF_STOCK\"").unwrap();
        assert_eq!(status, InventoryStatus::OutOfStock);
    }
}
