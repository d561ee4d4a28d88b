//! Upstream key provider types and client trait

mod client;
mod key;

pub use client::ProviderClient;
pub use key::{
    BatchOperation, BatchResult, CreateProviderKey, ProviderKey, ProviderKeyId,
    ProviderKeySummary,
};

#[cfg(test)]
pub use client::mock;
