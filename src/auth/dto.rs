use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::repo_types::User;
use crate::validation::{
    error, is_valid_email, null_as_empty, required, validate_email, validate_password,
    validate_username, FieldOrder, INVALID_EMAIL,
};

pub const MISSING_CREDENTIALS: &str = "Please input username and password";

fn validate_credential(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(required(MISSING_CREDENTIALS));
    }
    Ok(())
}

/// Reset requests answer a missing address the same way as a malformed one.
fn validate_reset_email(value: &str) -> Result<(), ValidationError> {
    if !is_valid_email(value.trim()) {
        return Err(error("email", INVALID_EMAIL));
    }
    Ok(())
}

/// Request body for user registration.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default, deserialize_with = "null_as_empty")]
    #[validate(custom(function = "validate_username"))]
    pub username: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    #[validate(custom(function = "validate_email"))]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    #[validate(custom(function = "validate_password"))]
    pub password: String,
}

impl FieldOrder for RegisterRequest {
    const FIELDS: &'static [&'static str] = &["username", "email", "password"];
}

/// Request body for login. Only presence is checked here.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default, deserialize_with = "null_as_empty")]
    #[validate(custom(function = "validate_credential"))]
    pub username: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    #[validate(custom(function = "validate_credential"))]
    pub password: String,
}

impl FieldOrder for LoginRequest {
    const FIELDS: &'static [&'static str] = &["username", "password"];
}

/// Request body for `POST /reset-password`.
#[derive(Debug, Deserialize, Validate)]
pub struct ResetRequest {
    #[serde(default, deserialize_with = "null_as_empty")]
    #[validate(custom(function = "validate_reset_email"))]
    pub email: String,
}

impl FieldOrder for ResetRequest {
    const FIELDS: &'static [&'static str] = &["email"];
}

/// Request body for `POST /reset-password/:token`.
#[derive(Debug, Deserialize, Validate)]
pub struct NewPasswordRequest {
    #[serde(rename = "newPassword")]
    #[serde(default, deserialize_with = "null_as_empty")]
    #[validate(custom(function = "validate_password"))]
    pub new_password: String,
}

impl FieldOrder for NewPasswordRequest {
    // validator may key the error by either the field or its serde name
    const FIELDS: &'static [&'static str] = &["new_password", "newPassword"];
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub user: User,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
