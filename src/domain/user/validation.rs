//! User validation utilities

use thiserror::Error;

/// Errors that can occur during user validation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UserValidationError {
    #[error("User ID must be a positive integer, got {0}")]
    InvalidId(i64),

    #[error("Name cannot be empty")]
    EmptyName,

    #[error("Name exceeds maximum length of {0} characters")]
    NameTooLong(usize),

    #[error("Email cannot be empty")]
    EmptyEmail,

    #[error("Email exceeds maximum length of {0} characters")]
    EmailTooLong(usize),

    #[error("Email '{0}' is not a valid address")]
    InvalidEmail(String),

    #[error("Age cannot be negative, got {0}")]
    NegativeAge(i32),

    #[error("Update contains no changes")]
    NoChanges,

    #[error("Unknown range dimension: '{0}'")]
    UnknownDimension(String),
}

const MAX_NAME_LENGTH: usize = 100;
const MAX_EMAIL_LENGTH: usize = 100;

pub fn validate_user_id(id: i64) -> Result<(), UserValidationError> {
    if id <= 0 {
        return Err(UserValidationError::InvalidId(id));
    }

    Ok(())
}

/// Validate a display name
///
/// Rules:
/// - Cannot be empty or whitespace only
/// - Maximum 100 characters (matches the VARCHAR(100) column)
pub fn validate_name(name: &str) -> Result<(), UserValidationError> {
    if name.trim().is_empty() {
        return Err(UserValidationError::EmptyName);
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(UserValidationError::NameTooLong(MAX_NAME_LENGTH));
    }

    Ok(())
}

/// Validate an email address
///
/// Only the shape `local@domain` is checked; deliverability is not our concern.
pub fn validate_email(email: &str) -> Result<(), UserValidationError> {
    if email.is_empty() {
        return Err(UserValidationError::EmptyEmail);
    }

    if email.chars().count() > MAX_EMAIL_LENGTH {
        return Err(UserValidationError::EmailTooLong(MAX_EMAIL_LENGTH));
    }

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(UserValidationError::InvalidEmail(email.to_string()));
    }

    Ok(())
}

pub fn validate_age(age: i32) -> Result<(), UserValidationError> {
    if age < 0 {
        return Err(UserValidationError::NegativeAge(age));
    }

    Ok(())
}
