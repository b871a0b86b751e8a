use std::str::FromStr;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use sesame_auth::{RoleDraft, RolePatch};
use sesame_core::RoleId;

use crate::app::{AppState, dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/:id", get(get_role).put(update_role).delete(delete_role))
}

fn parse_id(raw: &str) -> Result<RoleId, axum::response::Response> {
    RoleId::from_str(raw).map_err(|e| errors::service_error_to_response(e.into()))
}

pub async fn list_roles(Extension(state): Extension<AppState>) -> axum::response::Response {
    match state.roles.list().await {
        Ok(roles) => {
            let items = roles.iter().map(dto::role_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_role(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.roles.get(id).await {
        Ok(role) => (StatusCode::OK, Json(dto::role_to_json(&role))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_role(
    Extension(state): Extension<AppState>,
    body: Result<Json<dto::RoleRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::parse_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let draft = match RoleDraft::new(body.name, body.description) {
        Ok(d) => d,
        Err(e) => return errors::service_error_to_response(e.into()),
    };

    match state.roles.create(draft).await {
        Ok(role) => (StatusCode::CREATED, Json(dto::role_to_json(&role))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_role(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
    body: Result<Json<dto::RoleRequest>, JsonRejection>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let body = match dto::parse_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let patch = match RolePatch::new(body.name, body.description) {
        Ok(p) => p,
        Err(e) => return errors::service_error_to_response(e.into()),
    };

    match state.roles.update(id, patch).await {
        Ok(role) => (StatusCode::OK, Json(dto::role_to_json(&role))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_role(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.roles.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
