//! Keywarden
//!
//! Per-user API key lifecycle and usage reconciliation:
//! - Provisions and rotates provider-issued keys, one active key per user
//! - Tracks per-request usage in micro-dollars against monthly limits
//! - Scheduled passes for limit alerts, daily reports and monthly resets
//! - Webhook notifications with signed payloads

pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::DomainError;
