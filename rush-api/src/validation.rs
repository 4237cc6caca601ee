use std::sync::LazyLock;

use axum::extract::FromRequest;
use regex::Regex;

use crate::error::AppError;

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());
static LETTERS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z\s]+$").unwrap());
static EMAIL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());
static PLATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]{3}\d{3}$").unwrap());
static TIME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([0-1]\d|2[0-3]):([0-5]\d)$").unwrap());
static DATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{2}-\d{2}-\d{4}$").unwrap());

pub const MIN_PASSWORD_LEN: usize = 8;

/// JSON body extractor whose rejections (malformed JSON, unknown fields,
/// wrong types) come back as 400 with the usual error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Request bodies check their own field formats before any store access.
pub trait Validate {
    fn validate(&self) -> Result<(), AppError>;
}

fn check(re: &Regex, value: &str, message: &str) -> Result<(), AppError> {
    if re.is_match(value) {
        Ok(())
    } else {
        Err(AppError::ValidationError(message.to_string()))
    }
}

pub fn required(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::ValidationError(format!("{} is required", field)));
    }
    Ok(())
}

pub fn digits(field: &str, value: &str) -> Result<(), AppError> {
    check(&DIGITS, value, &format!("{} must contain only numbers", field))
}

pub fn letters(field: &str, value: &str) -> Result<(), AppError> {
    check(&LETTERS, value, &format!("{} must contain only letters", field))
}

pub fn email(value: &str) -> Result<(), AppError> {
    check(&EMAIL, value, "Invalid email format")
}

pub fn password(value: &str) -> Result<(), AppError> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::ValidationError(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

pub fn plate(value: &str) -> Result<(), AppError> {
    check(&PLATE, value, "Invalid plate format. Must be 3 letters and 3 numbers")
}

pub fn time_of_day(value: &str) -> Result<(), AppError> {
    check(&TIME, value, "Invalid time format. Use HH:mm")
}

pub fn date(value: &str) -> Result<(), AppError> {
    check(&DATE, value, "Invalid date format. Use DD-MM-YYYY")
}
