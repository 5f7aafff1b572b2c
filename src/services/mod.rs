//! Business logic services

pub mod availability;
pub mod booking;
pub mod captcha;
pub mod email;
pub mod inventory;
pub mod medical_records;
pub mod notifications;
pub mod redis;
pub mod users;

use chrono::{Local, NaiveDateTime};

use crate::{config::AppConfig, error::AppResult, repository::Repository};

/// Current clinic-local wall clock time; appointment slots are stored in this frame
pub fn clinic_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub users: users::UsersService,
    pub availability: availability::AvailabilityService,
    pub booking: booking::BookingService,
    pub inventory: inventory::InventoryService,
    pub medical_records: medical_records::MedicalRecordsService,
    pub notifications: notifications::NotificationService,
    pub redis: redis::RedisService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(
        repository: Repository,
        config: &AppConfig,
        redis_service: redis::RedisService,
        notifications: notifications::NotificationService,
    ) -> Self {
        let captcha = captcha::CaptchaService::new(config.captcha.clone());

        Self {
            users: users::UsersService::new(
                repository.clone(),
                config.auth.clone(),
                redis_service.clone(),
                captcha,
                notifications.clone(),
            ),
            availability: availability::AvailabilityService::new(repository.clone(), config.clinic.clone()),
            booking: booking::BookingService::new(repository.clone(), &config.clinic, notifications.clone()),
            inventory: inventory::InventoryService::new(repository.clone(), &config.clinic, notifications.clone()),
            medical_records: medical_records::MedicalRecordsService::new(repository.clone()),
            notifications,
            redis: redis_service,
            repository,
        }
    }

    /// Check that the database and Redis answer
    pub async fn ready(&self) -> AppResult<()> {
        self.repository.ping().await?;
        self.redis.ping().await
    }
}
