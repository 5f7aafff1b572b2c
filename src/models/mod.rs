//! Data models for Odonto

pub mod appointment;
pub mod availability;
pub mod enums;
pub mod inventory;
pub mod medical_record;
pub mod user;

// Re-export commonly used types
pub use appointment::{Appointment, AppointmentType};
pub use availability::{AvailableSlot, DaySlots, DoctorAvailability};
pub use enums::{
    AppointmentStatus, AvailabilityStatus, InventoryStatus, InventoryType, Role, Specialty,
};
pub use inventory::InventoryItem;
pub use medical_record::MedicalRecord;
pub use user::{User, UserClaims, UserShort};
