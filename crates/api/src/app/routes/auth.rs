use std::str::FromStr;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::Utc;

use sesame_auth::{Credentials, Registration, ResetConsumption, ResetRequest};
use sesame_core::IdentityId;

use crate::app::{AppState, dto, errors};
use crate::context::PrincipalContext;
use crate::middleware::AuthState;

const RESET_REQUESTED: &str = "If the email is registered, a reset link has been sent.";

/// No token required.
pub fn public_router() -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/request-password-reset", post(request_password_reset))
        .route("/auth/reset-password", post(reset_password))
}

/// Any valid token.
pub fn authenticated_router() -> Router {
    Router::new().route("/auth/me", get(me))
}

/// Valid token with the `backoffice` role.
pub fn backoffice_router() -> Router {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/users/:id", delete(deactivate))
}

pub async fn login(
    Extension(state): Extension<AppState>,
    body: Result<Json<dto::LoginRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::parse_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let credentials = match Credentials::new(body.email_or_username, body.password) {
        Ok(c) => c,
        Err(e) => return errors::service_error_to_response(e.into()),
    };

    match state.auth.authenticate(&credentials, Utc::now()).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(dto::LoginResponse {
                token: outcome.token,
                user: outcome.identity,
            }),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Acknowledge only; the token stays valid until it expires.
pub async fn logout(
    Extension(state): Extension<AppState>,
    Extension(auth): Extension<AuthState>,
    headers: HeaderMap,
) -> axum::response::Response {
    let claims = auth.claims_from_headers(&headers);
    state.auth.logout(claims.as_ref());
    (
        StatusCode::OK,
        Json(dto::MessageResponse {
            message: "Logged out. Discard the token on the client.",
        }),
    )
        .into_response()
}

pub async fn me(
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match state.auth.current_identity(principal.claims()).await {
        Ok(user) => (StatusCode::OK, Json(dto::UserResponse { user })).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn register(
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::RegisterRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::parse_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let registration = match Registration::try_from(sesame_auth::RegistrationFields::from(body)) {
        Ok(r) => r,
        Err(e) => return errors::service_error_to_response(e.into()),
    };

    match state.auth.register(registration, Utc::now()).await {
        Ok(user) => {
            tracing::info!(by = %principal.identity_id(), identity_id = %user.id, "registration via api");
            (
                StatusCode::CREATED,
                Json(serde_json::json!({
                    "message": "User created",
                    "user": user,
                })),
            )
                .into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn deactivate(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match IdentityId::from_str(&id) {
        Ok(id) => id,
        Err(e) => return errors::service_error_to_response(e.into()),
    };

    match state.auth.deactivate(id, Utc::now()).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Same 200 body whether or not the email belongs to anyone.
pub async fn request_password_reset(
    Extension(state): Extension<AppState>,
    body: Result<Json<dto::RequestResetRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::parse_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let request = match ResetRequest::new(body.email) {
        Ok(r) => r,
        Err(e) => return errors::service_error_to_response(e.into()),
    };

    match state.auth.request_reset(&request, Utc::now()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(dto::MessageResponse {
                message: RESET_REQUESTED,
            }),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn reset_password(
    Extension(state): Extension<AppState>,
    body: Result<Json<dto::ResetPasswordRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::parse_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let consumption = match ResetConsumption::new(body.token, body.new_password) {
        Ok(c) => c,
        Err(e) => return errors::service_error_to_response(e.into()),
    };

    match state.auth.consume_reset(&consumption, Utc::now()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(dto::MessageResponse {
                message: "Password has been reset.",
            }),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
