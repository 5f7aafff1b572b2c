//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{appointments, auth, availability, health, inventory, medical_records, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Odonto API",
        version = "1.0.0",
        description = "Dental clinic scheduling, inventory and medical records REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    modifiers(&SecurityAddon),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::register,
        auth::login,
        auth::me,
        auth::forgot_password,
        auth::reset_password,
        // Users
        users::list_users,
        users::get_user,
        users::create_staff,
        users::deactivate_patient,
        users::list_doctors,
        // Availability
        availability::resolve_slots,
        availability::list_windows,
        availability::create_window,
        availability::update_window,
        availability::update_window_status,
        availability::delete_window,
        // Appointments
        appointments::create_appointment,
        appointments::get_appointment,
        appointments::list_patient_appointments,
        appointments::list_doctor_appointments,
        appointments::update_appointment,
        appointments::reschedule_appointment,
        appointments::cancel_appointment,
        appointments::confirm_appointment,
        appointments::complete_appointment,
        appointments::list_appointment_types,
        // Inventory
        inventory::register_item,
        inventory::list_items,
        inventory::search_items,
        inventory::below_minimum,
        inventory::expiring,
        inventory::needing_sterilization,
        inventory::get_item,
        inventory::update_item,
        inventory::delete_item,
        inventory::set_quantity,
        inventory::restock,
        inventory::consume,
        inventory::mark_damaged,
        inventory::sterilize,
        // Medical records
        medical_records::create_record,
        medical_records::get_record,
        medical_records::update_record,
        medical_records::list_patient_records,
    ),
    components(
        schemas(
            // Enums
            crate::models::enums::Role,
            crate::models::enums::Specialty,
            crate::models::enums::AvailabilityStatus,
            crate::models::enums::AppointmentStatus,
            crate::models::enums::InventoryType,
            crate::models::enums::InventoryStatus,
            // Auth
            auth::LoginRequest,
            auth::LoginResponse,
            auth::UserInfo,
            auth::ForgotPasswordRequest,
            auth::ResetPasswordRequest,
            auth::MessageResponse,
            // Users
            crate::models::user::User,
            crate::models::user::UserShort,
            crate::models::user::RegisterPatient,
            crate::models::user::CreateStaff,
            users::DeactivationResponse,
            // Availability
            crate::models::availability::DoctorAvailability,
            crate::models::availability::CreateAvailability,
            crate::models::availability::UpdateAvailability,
            crate::models::availability::UpdateAvailabilityStatus,
            crate::models::availability::AvailableSlot,
            crate::models::availability::DaySlots,
            // Appointments
            crate::models::appointment::Appointment,
            crate::models::appointment::AppointmentType,
            crate::models::appointment::CreateAppointment,
            crate::models::appointment::RescheduleAppointment,
            crate::models::appointment::AdminUpdateAppointment,
            // Inventory
            crate::models::inventory::InventoryItem,
            crate::models::inventory::CreateInventoryItem,
            crate::models::inventory::UpdateInventoryItem,
            crate::models::inventory::RestockRequest,
            crate::models::inventory::ConsumeRequest,
            crate::models::inventory::SetQuantityRequest,
            crate::models::inventory::InventoryPage,
            // Medical records
            crate::models::medical_record::MedicalRecord,
            crate::models::medical_record::CreateMedicalRecord,
            crate::models::medical_record::UpdateMedicalRecord,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration, login and password recovery"),
        (name = "users", description = "Account administration and doctor directory"),
        (name = "availability", description = "Doctor availability windows and open slots"),
        (name = "appointments", description = "Appointment booking and lifecycle"),
        (name = "inventory", description = "Stock ledger"),
        (name = "medical_records", description = "Patient clinical history")
    )
)]
pub struct ApiDoc;

/// Registers the bearer scheme referenced by `security(("bearer_auth" = []))`
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
