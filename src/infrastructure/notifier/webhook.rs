//! Webhook notifier with HMAC-SHA256 payload signing

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;
use tracing::{info, warn};

use super::{AlertBatch, DailyReport, Notifier, RotationReport};
use crate::domain::DomainError;

type HmacSha256 = Hmac<Sha256>;

/// Notifier that POSTs payloads to a configured webhook URL.
///
/// When a secret is configured every payload carries an HMAC-SHA256
/// signature header the receiver can verify.
#[derive(Debug)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
    secret: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, secret: Option<String>) -> Result<Self, DomainError> {
        let url = url.into();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(DomainError::configuration(
                "Webhook URL must start with http:// or https://",
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                DomainError::configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            url,
            secret,
        })
    }

    fn generate_signature(secret: &str, payload: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    async fn deliver<T: Serialize>(&self, event_type: &str, payload: &T) {
        let body = match serde_json::to_string(payload) {
            Ok(body) => body,
            Err(e) => {
                warn!(event_type, "Failed to serialize webhook payload: {}", e);
                return;
            }
        };

        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("X-Webhook-Event", event_type);

        if let Some(ref secret) = self.secret {
            let signature = Self::generate_signature(secret, &body);
            request = request.header("X-Webhook-Signature", format!("sha256={}", signature));
        }

        match request.body(body).send().await {
            Ok(response) if response.status().is_success() => {
                info!(event_type, status = response.status().as_u16(), "Webhook delivered");
            }
            Ok(response) => {
                warn!(
                    event_type,
                    status = response.status().as_u16(),
                    "Webhook delivery failed with HTTP error"
                );
            }
            Err(e) => {
                warn!(event_type, "Webhook delivery failed: {}", e);
            }
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn alert_batch(&self, batch: &AlertBatch) {
        self.deliver("limit_alerts", batch).await;
    }

    async fn daily_report(&self, report: &DailyReport) {
        self.deliver("daily_report", report).await;
    }

    async fn rotation_report(&self, report: &RotationReport) {
        self.deliver("rotation_report", report).await;
    }
}
