//! CAPTCHA verification for public registration

use reqwest::Client;
use serde::Deserialize;

use crate::{
    config::CaptchaConfig,
    error::{AppError, AppResult},
};

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

#[derive(Clone)]
pub struct CaptchaService {
    client: Client,
    config: CaptchaConfig,
}

impl CaptchaService {
    pub fn new(config: CaptchaConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Check a client token against the verification endpoint. Always passes when disabled.
    pub async fn verify(&self, token: Option<&str>) -> AppResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let token = token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppError::Validation("CAPTCHA token is required".to_string()))?;

        let response = self
            .client
            .post(&self.config.verify_url)
            .form(&[("secret", self.config.secret.as_str()), ("response", token)])
            .send()
            .await
            .map_err(|e| AppError::Downstream(format!("CAPTCHA verification unavailable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Downstream(format!(
                "CAPTCHA verification returned HTTP {}",
                status
            )));
        }

        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|e| AppError::Downstream(format!("Invalid CAPTCHA verification response: {}", e)))?;

        if body.success {
            Ok(())
        } else {
            tracing::debug!(errors = ?body.error_codes, "CAPTCHA rejected");
            Err(AppError::Validation("CAPTCHA verification failed".to_string()))
        }
    }
}
