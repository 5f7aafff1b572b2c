//! Outgoing notification queue.
//!
//! Producers call [`NotificationService::enqueue`] after their transaction
//! commits; a background worker drains the queue and hands every recipient to
//! the [`Mailer`] on the blocking pool. Delivery failures are logged and never
//! reach the producer.

use std::sync::Arc;

use chrono::NaiveDateTime;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::error::{AppError, AppResult};

/// Sends a single plain-text message
#[cfg_attr(test, mockall::automock)]
pub trait Mailer: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()>;
}

/// Event worth an email
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    AppointmentBooked {
        to: String,
        patient_name: String,
        doctor_name: String,
        scheduled_at: NaiveDateTime,
    },
    AppointmentRescheduled {
        to: String,
        patient_name: String,
        doctor_name: String,
        previous: NaiveDateTime,
        scheduled_at: NaiveDateTime,
    },
    AppointmentCancelled {
        to: String,
        patient_name: String,
        doctor_name: String,
        scheduled_at: NaiveDateTime,
    },
    LowStock {
        recipients: Vec<String>,
        item_name: String,
        quantity: i32,
        minimum: i32,
    },
    PasswordReset {
        to: String,
        code: String,
        valid_minutes: u64,
    },
}

const DATE_FORMAT: &str = "%A %Y-%m-%d at %H:%M";

impl Notification {
    pub fn recipients(&self) -> Vec<&str> {
        match self {
            Notification::AppointmentBooked { to, .. }
            | Notification::AppointmentRescheduled { to, .. }
            | Notification::AppointmentCancelled { to, .. }
            | Notification::PasswordReset { to, .. } => vec![to.as_str()],
            Notification::LowStock { recipients, .. } => {
                recipients.iter().map(String::as_str).collect()
            }
        }
    }

    pub fn subject(&self) -> String {
        match self {
            Notification::AppointmentBooked { .. } => "Your appointment request was received".to_string(),
            Notification::AppointmentRescheduled { .. } => "Your appointment was rescheduled".to_string(),
            Notification::AppointmentCancelled { .. } => "Your appointment was cancelled".to_string(),
            Notification::LowStock { item_name, .. } => format!("Low stock: {}", item_name),
            Notification::PasswordReset { .. } => "Your Odonto password reset code".to_string(),
        }
    }

    pub fn body(&self) -> String {
        match self {
            Notification::AppointmentBooked {
                patient_name,
                doctor_name,
                scheduled_at,
                ..
            } => format!(
                "Hello {},\n\nYour appointment with Dr. {} is booked for {}.\n",
                patient_name,
                doctor_name,
                scheduled_at.format(DATE_FORMAT)
            ),
            Notification::AppointmentRescheduled {
                patient_name,
                doctor_name,
                previous,
                scheduled_at,
                ..
            } => format!(
                "Hello {},\n\nYour appointment with Dr. {} on {} was moved to {}.\n",
                patient_name,
                doctor_name,
                previous.format(DATE_FORMAT),
                scheduled_at.format(DATE_FORMAT)
            ),
            Notification::AppointmentCancelled {
                patient_name,
                doctor_name,
                scheduled_at,
                ..
            } => format!(
                "Hello {},\n\nYour appointment with Dr. {} on {} has been cancelled.\n",
                patient_name,
                doctor_name,
                scheduled_at.format(DATE_FORMAT)
            ),
            Notification::LowStock {
                item_name,
                quantity,
                minimum,
                ..
            } => format!(
                "{} is running low: {} left, minimum is {}.\nPlease reorder.\n",
                item_name, quantity, minimum
            ),
            Notification::PasswordReset {
                code,
                valid_minutes,
                ..
            } => format!(
                "Your password reset code is: {}\n\nThis code expires in {} minutes.\n\nIf you didn't request it, you can ignore this email.\n",
                code, valid_minutes
            ),
        }
    }
}

/// Handle used by services to queue notifications
#[derive(Clone)]
pub struct NotificationService {
    sender: mpsc::Sender<Notification>,
}

impl NotificationService {
    /// Create the queue and spawn its worker on the current runtime
    pub fn start(mailer: Arc<dyn Mailer>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run_worker(receiver, mailer));
        (Self { sender }, handle)
    }

    /// Queue a notification without waiting; a full or closed queue drops it
    pub fn enqueue(&self, notification: Notification) {
        if let Err(e) = self.sender.try_send(notification) {
            let reason = match &e {
                mpsc::error::TrySendError::Full(_) => "queue full",
                mpsc::error::TrySendError::Closed(_) => "queue closed",
            };
            let dropped = e.into_inner();
            tracing::warn!(
                reason,
                subject = %dropped.subject(),
                "Notification dropped"
            );
        }
    }
}

/// Drain the queue until every sender is gone
pub async fn run_worker(mut receiver: mpsc::Receiver<Notification>, mailer: Arc<dyn Mailer>) {
    tracing::info!("Notification worker started");
    while let Some(notification) = receiver.recv().await {
        deliver(mailer.clone(), &notification).await;
    }
    tracing::info!("Notification worker stopped");
}

/// Deliver to every recipient; returns how many deliveries succeeded
pub async fn deliver(mailer: Arc<dyn Mailer>, notification: &Notification) -> usize {
    let subject = notification.subject();
    let body = notification.body();
    let mut delivered = 0;

    for recipient in notification.recipients() {
        let mailer = mailer.clone();
        let (to, message_subject, message_body) = (recipient.to_string(), subject.clone(), body.clone());

        let result = tokio::task::spawn_blocking(move || mailer.send(&to, &message_subject, &message_body))
            .await
            .unwrap_or_else(|e| Err(AppError::Internal(format!("Mail task failed: {}", e))));

        match result {
            Ok(()) => {
                delivered += 1;
                tracing::debug!(to = recipient, subject = %subject, "Notification sent");
            }
            Err(e) => {
                tracing::warn!(to = recipient, subject = %subject, error = %e, "Notification delivery failed");
            }
        }
    }

    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn low_stock(recipients: &[&str]) -> Notification {
        Notification::LowStock {
            recipients: recipients.iter().map(|s| s.to_string()).collect(),
            item_name: "Gloves".to_string(),
            quantity: 15,
            minimum: 20,
        }
    }

    #[tokio::test]
    async fn test_fan_out_continues_after_failure() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|to, _, _| to.to_string() == "broken@clinic.test")
            .times(1)
            .returning(|_, _, _| Err(AppError::Downstream("smtp down".to_string())));
        mailer
            .expect_send()
            .withf(|to, _, _| to.to_string() != "broken@clinic.test")
            .times(2)
            .returning(|_, _, _| Ok(()));

        let notification = low_stock(&["a@clinic.test", "broken@clinic.test", "b@clinic.test"]);
        let delivered = deliver(Arc::new(mailer), &notification).await;
        assert_eq!(delivered, 2);
    }

    #[tokio::test]
    async fn test_worker_drains_queue() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|to, subject, _| {
                to.to_string() == "admin@clinic.test" && subject.to_string() == "Low stock: Gloves"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let (service, handle) = NotificationService::start(Arc::new(mailer), 4);
        service.enqueue(low_stock(&["admin@clinic.test"]));
        drop(service);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_enqueue_on_closed_queue_does_not_panic() {
        let (sender, receiver) = mpsc::channel(1);
        drop(receiver);
        let service = NotificationService { sender };
        service.enqueue(low_stock(&["admin@clinic.test"]));
    }

    #[test]
    fn test_rendering() {
        let at = NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let booked = Notification::AppointmentBooked {
            to: "ana@example.com".to_string(),
            patient_name: "Ana Lopez".to_string(),
            doctor_name: "Ruiz".to_string(),
            scheduled_at: at,
        };
        assert_eq!(booked.recipients(), vec!["ana@example.com"]);
        assert!(booked.body().contains("Monday 2025-03-10 at 09:00"));

        let stock = low_stock(&["x@clinic.test", "y@clinic.test"]);
        assert_eq!(stock.recipients().len(), 2);
        assert!(stock.body().contains("15 left"));
    }
}
