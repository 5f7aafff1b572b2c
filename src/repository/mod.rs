//! Repository layer for database operations

pub mod appointments;
pub mod availability;
pub mod inventory;
pub mod medical_records;
pub mod users;

use sqlx::{Pool, Postgres};

use crate::error::AppResult;

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub users: users::UsersRepository,
    pub availability: availability::AvailabilityRepository,
    pub appointments: appointments::AppointmentsRepository,
    pub inventory: inventory::InventoryRepository,
    pub medical_records: medical_records::MedicalRecordsRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            users: users::UsersRepository::new(pool.clone()),
            availability: availability::AvailabilityRepository::new(pool.clone()),
            appointments: appointments::AppointmentsRepository::new(pool.clone()),
            inventory: inventory::InventoryRepository::new(pool.clone()),
            medical_records: medical_records::MedicalRecordsRepository::new(pool.clone()),
            pool,
        }
    }

    /// Round-trip to the database
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
