//! HTTP client for the key provider's management API

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::domain::provider::{
    BatchOperation, BatchResult, CreateProviderKey, ProviderClient, ProviderKey, ProviderKeyId,
    ProviderKeySummary,
};
use crate::domain::DomainError;

const PROVIDER_NAME: &str = "key-provider";

/// Provider client over the management REST API.
///
/// Every request carries the admin credential as a bearer token and runs
/// under a bounded timeout. Create calls carry an idempotency key so a
/// timed-out provisioning attempt can not silently double-issue.
#[derive(Debug, Clone)]
pub struct HttpProviderClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    operation: BatchOperation,
    ids: &'a [ProviderKeyId],
}

impl HttpProviderClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, DomainError> {
        if config.api_key.is_empty() {
            return Err(DomainError::configuration(
                "Provider API key is not configured",
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                DomainError::configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn classify_error(
        response: reqwest::Response,
        context: &str,
    ) -> DomainError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = if body.is_empty() {
            context.to_string()
        } else {
            format!("{}: {}", context, body)
        };

        match status {
            StatusCode::NOT_FOUND => DomainError::not_found(message),
            StatusCode::CONFLICT => DomainError::conflict(message),
            _ => DomainError::provider_status(PROVIDER_NAME, status.as_u16(), message),
        }
    }

    fn transport_error(e: reqwest::Error, context: &str) -> DomainError {
        warn!("Provider request failed: {}: {}", context, e);
        DomainError::provider(PROVIDER_NAME, format!("{}: {}", context, e))
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn create_key(&self, request: CreateProviderKey) -> Result<ProviderKey, DomainError> {
        debug!("Provisioning provider key '{}'", request.name);

        let response = self
            .client
            .post(self.url("/v1/keys"))
            .bearer_auth(&self.api_key)
            .header("Idempotency-Key", uuid::Uuid::new_v4().to_string())
            .json(&request)
            .send()
            .await
            .map_err(|e| Self::transport_error(e, "create key"))?;

        if !response.status().is_success() {
            return Err(Self::classify_error(response, "create key").await);
        }

        response
            .json::<ProviderKey>()
            .await
            .map_err(|e| Self::transport_error(e, "decode created key"))
    }

    async fn get_key(&self, id: &ProviderKeyId) -> Result<ProviderKeySummary, DomainError> {
        let response = self
            .client
            .get(self.url(&format!("/v1/keys/{}", id)))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| Self::transport_error(e, "get key"))?;

        if !response.status().is_success() {
            return Err(Self::classify_error(response, "get key").await);
        }

        response
            .json::<ProviderKeySummary>()
            .await
            .map_err(|e| Self::transport_error(e, "decode key"))
    }

    async fn delete_key(&self, id: &ProviderKeyId) -> Result<(), DomainError> {
        debug!("Deleting provider key '{}'", id);

        let response = self
            .client
            .delete(self.url(&format!("/v1/keys/{}", id)))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| Self::transport_error(e, "delete key"))?;

        if !response.status().is_success() {
            return Err(Self::classify_error(response, "delete key").await);
        }

        Ok(())
    }

    async fn list_keys(&self, limit: usize) -> Result<Vec<ProviderKeySummary>, DomainError> {
        let response = self
            .client
            .get(self.url("/v1/keys"))
            .query(&[("limit", limit)])
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| Self::transport_error(e, "list keys"))?;

        if !response.status().is_success() {
            return Err(Self::classify_error(response, "list keys").await);
        }

        response
            .json::<Vec<ProviderKeySummary>>()
            .await
            .map_err(|e| Self::transport_error(e, "decode key list"))
    }

    async fn batch(
        &self,
        operation: BatchOperation,
        ids: &[ProviderKeyId],
    ) -> Result<Vec<BatchResult>, DomainError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Applying batch {} to {} provider keys", operation, ids.len());

        let response = self
            .client
            .post(self.url("/v1/keys/batch"))
            .bearer_auth(&self.api_key)
            .json(&BatchRequest { operation, ids })
            .send()
            .await
            .map_err(|e| Self::transport_error(e, "batch operation"))?;

        if !response.status().is_success() {
            return Err(Self::classify_error(response, "batch operation").await);
        }

        response
            .json::<Vec<BatchResult>>()
            .await
            .map_err(|e| Self::transport_error(e, "decode batch results"))
    }
}
