use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub mod formatter;
pub mod telegram;

pub use formatter::{format_problems, format_sales};
pub use telegram::TelegramNotifier;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Delivery to {recipient} rejected ({status}): {description}")]
    Rejected {
        recipient: String,
        status: u16,
        description: String,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MessageFormat {
    Plain,
    Html,
}

/// Transport that delivers one message to one recipient.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        text: &str,
        format: MessageFormat,
    ) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

impl DeliveryReport {
    pub fn merge(&mut self, other: DeliveryReport) {
        self.delivered += other.delivered;
        self.failed += other.failed;
    }
}

/// Fans a message out to every configured recipient.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sink: Arc<dyn NotificationSink>,
    recipients: Vec<String>,
}

impl NotificationDispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>, recipients: Vec<String>) -> Self {
        Self { sink, recipients }
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub fn is_recipient(&self, id: &str) -> bool {
        self.recipients.iter().any(|recipient| recipient == id)
    }

    /// Sends `text` to each recipient in turn. A failed delivery is logged and
    /// does not stop delivery to the others.
    pub async fn broadcast(&self, text: &str) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for recipient in &self.recipients {
            report.merge(self.send_to(recipient, text).await);
        }
        report
    }

    pub async fn send_to(&self, recipient: &str, text: &str) -> DeliveryReport {
        match self.sink.send(recipient, text, MessageFormat::Html).await {
            Ok(()) => {
                tracing::debug!(recipient = %recipient, "Notification delivered");
                DeliveryReport { delivered: 1, failed: 0 }
            }
            Err(e) => {
                tracing::error!(recipient = %recipient, "Failed to send notification: {}", e);
                DeliveryReport { delivered: 0, failed: 1 }
            }
        }
    }
}
