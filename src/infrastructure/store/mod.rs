//! Key store implementations

mod in_memory;
mod postgres;

pub use in_memory::InMemoryKeyStore;
pub use postgres::{PostgresConfig, PostgresKeyStore};
