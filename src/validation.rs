use std::borrow::Cow;

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::AppError;

pub const MISSING_FIELDS: &str = "All required fields must be filled";
pub const INVALID_USERNAME: &str =
    "Invalid username format. Username must be alphanumeric and between 3 and 20 characters";
pub const INVALID_EMAIL: &str = "Invalid email format";
pub const INVALID_PASSWORD: &str = "Password must be between 6 and 20 characters and contain at least one numeric digit, one uppercase and one lowercase letter";

const REQUIRED: &str = "required";
/// Key validator uses for struct-level (schema) errors.
const SCHEMA_KEY: &str = "__all__";

lazy_static! {
    static ref USERNAME_RE: Regex = Regex::new(r"^[a-zA-Z0-9]{3,20}$").unwrap();
    static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

/// Order in which a request's fields are checked when picking the one
/// message reported back to the client.
pub trait FieldOrder {
    const FIELDS: &'static [&'static str];
}

pub fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

/// Missing-field error; these outrank format errors in [`first_message`].
pub fn required(message: &'static str) -> ValidationError {
    error(REQUIRED, message)
}

pub fn missing() -> ValidationError {
    required(MISSING_FIELDS)
}

/// Reads an explicit `null` as an empty string so it hits the missing-field
/// rule instead of failing to parse. Pair with `#[serde(default)]`.
pub fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn validate_username(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(missing());
    }
    if !USERNAME_RE.is_match(value) {
        return Err(error("username", INVALID_USERNAME));
    }
    Ok(())
}

pub fn validate_email(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(missing());
    }
    if !is_valid_email(value) {
        return Err(error("email", INVALID_EMAIL));
    }
    Ok(())
}

/// 6 to 20 characters with at least one digit, one lowercase and one
/// uppercase letter.
pub fn is_valid_password(value: &str) -> bool {
    let len = value.chars().count();
    (6..=20).contains(&len)
        && value.chars().any(|c| c.is_ascii_digit())
        && value.chars().any(|c| c.is_ascii_lowercase())
        && value.chars().any(|c| c.is_ascii_uppercase())
}

pub fn validate_password(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(missing());
    }
    if !is_valid_password(value) {
        return Err(error("password", INVALID_PASSWORD));
    }
    Ok(())
}

/// Collapses validator's per-field error map into a single message: any
/// missing field wins, otherwise the first failing field in `order`.
pub fn first_message(errors: &ValidationErrors, order: &[&str]) -> String {
    let field_errors = errors.field_errors();
    let mut ordered: Vec<&Vec<ValidationError>> = order
        .iter()
        .chain(std::iter::once(&SCHEMA_KEY))
        .filter_map(|field| field_errors.get(*field).copied())
        .collect();
    if ordered.is_empty() {
        ordered = field_errors.values().copied().collect();
    }

    let chosen = ordered
        .iter()
        .flat_map(|list| list.iter())
        .find(|e| e.code == REQUIRED)
        .or_else(|| ordered.iter().flat_map(|list| list.iter()).next());

    match chosen {
        Some(e) => e
            .message
            .as_ref()
            .map(|m| m.to_string())
            .unwrap_or_else(|| e.code.to_string()),
        None => errors.to_string(),
    }
}

/// JSON body extractor that runs the type's declarative rules before the
/// handler sees it.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate + FieldOrder,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        value
            .validate()
            .map_err(|errors| AppError::Validation(first_message(&errors, T::FIELDS)))?;
        Ok(Self(value))
    }
}
