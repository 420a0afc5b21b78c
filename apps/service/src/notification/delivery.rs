use async_trait::async_trait;
use reqwest::{Client, Method, header::CONTENT_TYPE};
use std::time::Duration;
use thiserror::Error;

use super::message::NotificationMessage;
use crate::database::models::{ChannelConfig, WebhookConfig};

/// Longest channel response body kept in an error
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Failed to build HTTP client: {0}")]
    Build(reqwest::Error),

    #[error("Invalid channel configuration: {0}")]
    InvalidChannel(String),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Channel responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// What the channel answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub status_code: u16,
}

/// One best-effort attempt to hand a message to a channel
#[async_trait]
pub trait Deliver: Send + Sync {
    async fn deliver(
        &self,
        config: &ChannelConfig,
        message: &NotificationMessage,
    ) -> Result<DeliveryReceipt, DeliveryError>;
}

/// Sends notifications as HTTP requests
pub struct WebhookSender {
    client: Client,
}

impl WebhookSender {
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("Upkeep-Monitor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(DeliveryError::Build)?;
        Ok(Self { client })
    }

    async fn send_webhook(
        &self,
        webhook: &WebhookConfig,
        message: &NotificationMessage,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let method = Method::from_bytes(webhook.method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| DeliveryError::InvalidChannel(format!("unsupported method '{}'", webhook.method)))?;
        let url = url::Url::parse(&webhook.url)
            .map_err(|e| DeliveryError::InvalidChannel(format!("invalid url '{}': {e}", webhook.url)))?;
        let carries_body = !matches!(method, Method::GET | Method::HEAD);

        let mut request = self.client.request(method, url);
        if carries_body {
            request = match &webhook.body_template {
                Some(template) => {
                    let body = message.render(template);
                    let content_type = if serde_json::from_str::<serde_json::Value>(&body).is_ok() {
                        "application/json"
                    } else {
                        "text/plain; charset=utf-8"
                    };
                    request.header(CONTENT_TYPE, content_type).body(body)
                }
                None => request.json(&message.payload()),
            };
        }
        // Configured headers go last so they can override the content type.
        for (name, value) in &webhook.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_builder() {
                DeliveryError::InvalidChannel(e.to_string())
            } else {
                DeliveryError::Transport(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY).rev().find(|i| body.is_char_boundary(*i)).unwrap_or(0);
                body.truncate(cut);
            }
            return Err(DeliveryError::Status { status: status.as_u16(), body });
        }

        Ok(DeliveryReceipt { status_code: status.as_u16() })
    }
}

#[async_trait]
impl Deliver for WebhookSender {
    async fn deliver(
        &self,
        config: &ChannelConfig,
        message: &NotificationMessage,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        match config {
            ChannelConfig::Webhook(webhook) => self.send_webhook(webhook, message).await,
        }
    }
}
