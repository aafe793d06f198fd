use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{MessageFormat, NotificationSink, NotifyError};
use crate::config::TelegramConfig;

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Delivers messages through the Telegram Bot API `sendMessage` method.
pub struct TelegramNotifier {
    client: Client,
    config: TelegramConfig,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.bot_token
        )
    }

    fn create_payload(&self, recipient: &str, text: &str, format: MessageFormat) -> serde_json::Value {
        let mut payload = json!({
            "chat_id": recipient,
            "text": text,
            "disable_web_page_preview": self.config.disable_web_page_preview,
        });

        if format == MessageFormat::Html {
            payload["parse_mode"] = json!("HTML");
        }

        payload
    }
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    async fn send(
        &self,
        recipient: &str,
        text: &str,
        format: MessageFormat,
    ) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.endpoint())
            .json(&self.create_payload(recipient, text, format))
            .send()
            .await?;

        let status = response.status();
        let body: Option<TelegramResponse> = response.json().await.ok();

        match body {
            Some(TelegramResponse { ok: true, .. }) if status.is_success() => Ok(()),
            other => Err(NotifyError::Rejected {
                recipient: recipient.to_string(),
                status: status.as_u16(),
                description: other
                    .and_then(|body| body.description)
                    .unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }
}
