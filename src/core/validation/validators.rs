//! Reusable field validators
//!
//! Custom rules plugged into `#[validate(custom(function = "..."))]`.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;
use validator::ValidationError;

static CATEGORY_SLUG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("category slug pattern is valid")
});

fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// Validator: string must contain something other than whitespace
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(error("not_blank", "must not be blank"))
    } else {
        Ok(())
    }
}

/// Validator: lowercase slug such as `running-shoes`
pub fn category_slug(value: &str) -> Result<(), ValidationError> {
    if CATEGORY_SLUG.is_match(value) {
        Ok(())
    } else {
        Err(error(
            "category_slug",
            "must be lowercase letters, digits and single dashes",
        ))
    }
}

/// Validator: password mixes letters and digits
pub fn password_strength(value: &str) -> Result<(), ValidationError> {
    let has_letter = value.chars().any(char::is_alphabetic);
    let has_digit = value.chars().any(|c| c.is_ascii_digit());
    if has_letter && has_digit {
        Ok(())
    } else {
        Err(error(
            "password_strength",
            "must contain at least one letter and one digit",
        ))
    }
}
