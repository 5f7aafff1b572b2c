//! Odonto Dental Clinic Server
//!
//! REST JSON API for a dental clinic: doctor availability and slot
//! resolution, appointment booking, the stock ledger and patient
//! medical records.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
