//! SMTP delivery of clinic notifications

use lettre::{
    message::{header::ContentType, Mailbox, Message, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};
use std::str::FromStr;

use crate::{
    config::EmailConfig,
    error::{AppError, AppResult},
    services::notifications::Mailer,
};

#[derive(Clone)]
pub struct EmailService {
    config: EmailConfig,
    transport: SmtpTransport,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> AppResult<Self> {
        let builder = if config.smtp_use_tls {
            SmtpTransport::starttls_relay(&config.smtp_host)
                .map_err(|e| AppError::Internal(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(&config.smtp_host)
        }
        .port(config.smtp_port);

        let builder = if let (Some(username), Some(password)) =
            (&config.smtp_username, &config.smtp_password)
        {
            builder.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            builder
        };

        Ok(Self {
            transport: builder.build(),
            config,
        })
    }

    fn build_message(&self, to: &str, subject: &str, body: &str) -> AppResult<Message> {
        let from_name = self.config.smtp_from_name.as_deref().unwrap_or("Odonto");
        let from_mailbox = Mailbox::from_str(&format!("{} <{}>", from_name, self.config.smtp_from))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;

        let to_mailbox = Mailbox::from_str(to)
            .map_err(|e| AppError::Downstream(format!("Invalid recipient address {}: {}", to, e)))?;

        Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(format!(
                                r#"<html><body><p>{}</p></body></html>"#,
                                html_escape(body).replace('\n', "<br>")
                            )),
                    ),
            )
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))
    }
}

impl Mailer for EmailService {
    /// Blocking SMTP send; callers run it on the blocking pool
    fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        let message = self.build_message(to, subject, body)?;
        self.transport
            .send(&message)
            .map_err(|e| AppError::Downstream(format!("Failed to send email to {}: {}", to, e)))?;
        Ok(())
    }
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> EmailService {
        EmailService::new(EmailConfig {
            smtp_host: "localhost".to_string(),
            smtp_port: 1025,
            smtp_username: None,
            smtp_password: None,
            smtp_from: "noreply@odonto.local".to_string(),
            smtp_from_name: None,
            smtp_use_tls: false,
        })
        .unwrap()
    }

    #[test]
    fn test_build_message() {
        let message = service()
            .build_message("patient@example.com", "Hello", "Line one\nLine <two>")
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Hello"));
        assert!(raw.contains("patient@example.com"));
    }

    #[test]
    fn test_invalid_recipient_is_downstream_error() {
        let err = service().build_message("not an address", "x", "y").unwrap_err();
        assert!(matches!(err, AppError::Downstream(_)));
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("a < b & c"), "a &lt; b &amp; c");
    }
}
