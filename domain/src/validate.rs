//! Lightweight input validation helpers. Keep logic minimal and deterministic.
//!
//! Lengths are counted in characters, not bytes, so accented names validate the
//! same way they read.

use crate::CoreError;

/// Referred person's name: at least 2 characters.
pub fn validate_indicated_name(s: &str) -> Result<(), CoreError> {
    if s.trim().chars().count() < 2 {
        return Err(CoreError::InvalidInput("name must have at least 2 characters".into()));
    }
    Ok(())
}

/// Referred person's phone: at least 10 characters, free-form otherwise.
pub fn validate_indicated_phone(s: &str) -> Result<(), CoreError> {
    if s.trim().chars().count() < 10 {
        return Err(CoreError::InvalidInput("phone must have at least 10 digits".into()));
    }
    Ok(())
}

/// Account email: a non-empty local part and a dotted domain.
pub fn validate_email(s: &str) -> Result<(), CoreError> {
    let valid = s
        .trim()
        .rsplit_once('@')
        .is_some_and(|(local, domain)| {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        });
    if !valid {
        return Err(CoreError::InvalidInput("invalid email".into()));
    }
    Ok(())
}

/// Account password: at least 6 characters.
pub fn validate_password(s: &str) -> Result<(), CoreError> {
    if s.chars().count() < 6 {
        return Err(CoreError::InvalidInput("password must have at least 6 characters".into()));
    }
    Ok(())
}
