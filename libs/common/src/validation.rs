//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

/// Validate a phone number used as the login handle
pub fn validate_phone(phone: &str) -> Result<(), String> {
    if phone.is_empty() {
        return Err("Phone is required".to_string());
    }

    static PHONE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = PHONE_REGEX
        .get_or_init(|| Regex::new(r"^\+?[0-9]{10,15}$").expect("Failed to compile phone regex"));

    if !regex.is_match(phone) {
        return Err("Phone must contain 10 to 15 digits, optionally prefixed with +".to_string());
    }

    Ok(())
}

/// Validate password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }

    if password.chars().count() > 128 {
        return Err("Password must be at most 128 characters long".to_string());
    }

    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err("Password must contain at least one letter".to_string());
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit".to_string());
    }

    Ok(())
}

/// Validate a required display name such as a first name or a pet name
pub fn validate_name(field: &str, value: &str) -> Result<(), String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(format!("{} is required", field));
    }

    if value.chars().count() > 64 {
        return Err(format!("{} must be at most 64 characters long", field));
    }

    Ok(())
}
