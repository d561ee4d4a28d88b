//! Core domain types and traits

pub mod error;
pub mod key;
pub mod provider;
pub mod tier;
pub mod usage;

pub use error::DomainError;
