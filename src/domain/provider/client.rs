//! Key provider client trait

use async_trait::async_trait;
use std::fmt::Debug;

use super::key::{
    BatchOperation, BatchResult, CreateProviderKey, ProviderKey, ProviderKeyId, ProviderKeySummary,
};
use crate::domain::DomainError;

/// Client for the upstream key-provisioning service.
///
/// Pure request/response mapping - no local state. Failures surface as
/// classified errors, never as default or empty values.
#[async_trait]
pub trait ProviderClient: Send + Sync + Debug {
    /// Provision a new key. The response carries the secret exactly once.
    async fn create_key(&self, request: CreateProviderKey) -> Result<ProviderKey, DomainError>;

    /// Fetch key metadata. A missing key is a NotFound error.
    async fn get_key(&self, id: &ProviderKeyId) -> Result<ProviderKeySummary, DomainError>;

    /// Delete a key. A missing key is a NotFound error.
    async fn delete_key(&self, id: &ProviderKeyId) -> Result<(), DomainError>;

    /// List provisioned keys, up to `limit`
    async fn list_keys(&self, limit: usize) -> Result<Vec<ProviderKeySummary>, DomainError>;

    /// Apply an operation to a batch of keys. Each result carries its own
    /// success or failure.
    async fn batch(
        &self,
        operation: BatchOperation,
        ids: &[ProviderKeyId],
    ) -> Result<Vec<BatchResult>, DomainError>;
}
