//! User key records and the key store trait

mod entity;
mod store;
mod validation;

pub use entity::{KeyStatus, UserKey, UserKeyId, UserId};
pub use store::KeyStore;
pub use validation::{validate_monthly_limit, validate_user_id, KeyValidationError};
