//! Input validation for account fields
//!
//! Phone numbers are normalized to the international `2547XXXXXXXX` /
//! `2541XXXXXXXX` form before they are stored or compared, so `0712 345 678`,
//! `+254712345678` and `254712345678` all identify the same account.

use validator::{ValidateEmail, ValidationErrors};

/// Validation errors for account input
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("invalid email address: '{0}'")]
    InvalidEmail(String),

    #[error("invalid phone number: '{0}' (expected a Kenyan mobile number)")]
    InvalidPhone(String),

    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("invalid fields: {0}")]
    Fields(String),
}

pub const MIN_PASSWORD_LEN: usize = 8;

const COUNTRY_CODE: &str = "254";

/// Normalize a Kenyan mobile number to `254XXXXXXXXX`.
///
/// Accepts `07XXXXXXXX`, `01XXXXXXXX`, `7XXXXXXXX`, `2547XXXXXXXX` and the
/// `+254` forms, with spaces or dashes anywhere.
pub fn normalize_phone(raw: &str) -> Result<String, ValidationError> {
    let digits: String = raw
        .trim()
        .trim_start_matches('+')
        .chars()
        .filter(|c| !matches!(c, ' ' | '-'))
        .collect();

    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidPhone(raw.to_string()));
    }

    let subscriber = if let Some(rest) = digits.strip_prefix(COUNTRY_CODE) {
        rest
    } else if let Some(rest) = digits.strip_prefix('0') {
        rest
    } else {
        digits.as_str()
    };

    let valid = subscriber.len() == 9 && matches!(subscriber.as_bytes()[0], b'7' | b'1');
    if !valid {
        return Err(ValidationError::InvalidPhone(raw.to_string()));
    }
    Ok(format!("{}{}", COUNTRY_CODE, subscriber))
}

/// Trimmed, lowercased email
pub fn normalize_email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim().to_lowercase();
    if !email.validate_email() {
        return Err(ValidationError::InvalidEmail(raw.to_string()));
    }
    Ok(email)
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Trimmed non-empty text
pub fn required(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required { field });
    }
    Ok(value.to_string())
}

/// Flatten `validator` derive output into one message listing the fields.
pub fn from_validation_errors(errors: &ValidationErrors) -> ValidationError {
    let mut fields: Vec<String> = errors
        .field_errors()
        .keys()
        .map(|k| k.to_string())
        .collect();
    fields.sort();
    ValidationError::Fields(fields.join(", "))
}
