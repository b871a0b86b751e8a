//! Request and response bodies.
//!
//! Request fields are all optional so that a missing field reaches the typed
//! constructors in `sesame_auth::request` and comes back as a field-level
//! validation error, not a generic deserialization failure.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use sesame_auth::{IdentitySummary, RegistrationFields, RoleRecord};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email_or_username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub salutation: Option<String>,
    pub title: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub start_date: Option<String>,
    pub holiday_days: Option<i32>,
    pub roles: Option<Vec<String>>,
}

impl From<RegisterRequest> for RegistrationFields {
    fn from(body: RegisterRequest) -> Self {
        RegistrationFields {
            email: body.email,
            username: body.username,
            password: body.password,
            salutation: body.salutation,
            title: body.title,
            firstname: body.firstname,
            lastname: body.lastname,
            start_date: body.start_date,
            holiday_days: body.holiday_days,
            roles: body.roles,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RequestResetRequest {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RoleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: IdentitySummary,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: IdentitySummary,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

pub fn role_to_json(role: &RoleRecord) -> serde_json::Value {
    serde_json::json!({
        "id": role.id.to_string(),
        "name": role.name.as_str(),
        "description": role.description,
    })
}

/// Unwrap a JSON body, mapping framework rejections to our validation shape.
pub fn parse_body<T>(body: Result<axum::Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    match body {
        Ok(axum::Json(value)) => Ok(value),
        Err(rejection) => {
            tracing::debug!(reason = %rejection.body_text(), "request body rejected");
            Err(errors::field_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "body",
                "request body must be a JSON object",
            ))
        }
    }
}
