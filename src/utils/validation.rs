use validator::{Validate, ValidateEmail};

pub fn validate<T: Validate>(val: &T) -> Result<(), validator::ValidationErrors> {
    val.validate()
}

/// Trims and lowercases an email address so it can be used as part of a key.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn is_valid_email(candidate: &str) -> bool {
    candidate.validate_email()
}

/// Collapses blank optional text to `None`.
pub fn non_blank(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
