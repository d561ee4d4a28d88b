//! Key record validation utilities

use thiserror::Error;

/// Errors that can occur validating key-related input
#[derive(Debug, Error, Clone, PartialEq)]
pub enum KeyValidationError {
    #[error("User ID cannot be empty")]
    EmptyUserId,

    #[error("User ID exceeds maximum length of {0} characters")]
    TooLong(usize),

    #[error("User ID contains invalid character: '{0}'. Only alphanumeric characters, hyphens and underscores are allowed")]
    InvalidCharacter(char),

    #[error("Monthly limit must be positive")]
    NonPositiveLimit,

    #[error("Cost must not be negative")]
    NegativeCost,

    #[error("Token counts do not add up: {request} + {response} != {total}")]
    TokenMismatch {
        request: u32,
        response: u32,
        total: u32,
    },

    #[error("Model identifier cannot be empty")]
    EmptyModel,
}

const MAX_USER_ID_LENGTH: usize = 64;

/// Validate a user ID
///
/// Rules:
/// - Cannot be empty
/// - Maximum 64 characters
/// - Only alphanumeric characters, hyphens and underscores
pub fn validate_user_id(id: &str) -> Result<(), KeyValidationError> {
    if id.is_empty() {
        return Err(KeyValidationError::EmptyUserId);
    }

    if id.len() > MAX_USER_ID_LENGTH {
        return Err(KeyValidationError::TooLong(MAX_USER_ID_LENGTH));
    }

    for c in id.chars() {
        if !c.is_ascii_alphanumeric() && c != '-' && c != '_' {
            return Err(KeyValidationError::InvalidCharacter(c));
        }
    }

    Ok(())
}

/// Validate an explicitly supplied monthly limit
pub fn validate_monthly_limit(limit_micros: i64) -> Result<(), KeyValidationError> {
    if limit_micros <= 0 {
        return Err(KeyValidationError::NonPositiveLimit);
    }
    Ok(())
}
