//! Key lifecycle management

mod service;

pub use service::{
    CreateKeyRequest, CreatedKey, KeyLifecycleService, LifecycleError, RotatedKey,
};
