//! Redis service for short-lived password reset codes

use redis::{AsyncCommands, Client};
use sha2::{Digest, Sha256};

use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct RedisService {
    client: Client,
}

impl RedisService {
    /// Create a new Redis service
    pub async fn new(url: &str) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::Internal(format!("Failed to create Redis client: {}", e)))?;

        let service = Self { client };
        service.ping().await?;
        Ok(service)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to get Redis connection: {}", e)))
    }

    /// Round-trip check
    pub async fn ping(&self) -> AppResult<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AppError::Internal(format!("Redis connection test failed: {}", e)))?;
        Ok(())
    }

    /// Store the digest of a reset code, replacing any previous one
    pub async fn store_reset_code(&self, user_id: i32, code: &str, expiration_seconds: u64) -> AppResult<()> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(reset_key(user_id), digest(code), expiration_seconds)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to store reset code in Redis: {}", e)))?;
        Ok(())
    }

    /// Verify and consume a reset code
    pub async fn consume_reset_code(&self, user_id: i32, code: &str) -> AppResult<bool> {
        let mut conn = self.connection().await?;
        let key = reset_key(user_id);

        let stored: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read reset code from Redis: {}", e)))?;

        match stored {
            Some(stored) if stored == digest(code) => {
                let _: () = conn
                    .del(&key)
                    .await
                    .map_err(|e| AppError::Internal(format!("Failed to delete reset code from Redis: {}", e)))?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

fn reset_key(user_id: i32) -> String {
    format!("password_reset:{}", user_id)
}

/// Hex SHA-256 of a code; only digests are kept in Redis
pub fn digest(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_stable_hex() {
        let d = digest("123456");
        assert_eq!(d.len(), 64);
        assert_eq!(d, digest("123456"));
        assert_ne!(d, digest("123457"));
        assert_eq!(reset_key(4), "password_reset:4");
    }
}
