use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use sesame_infra::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Unauthorized => unauthorized(),
        ServiceError::Forbidden => forbidden(),
        ServiceError::Validation { field, message } => {
            field_error(StatusCode::BAD_REQUEST, "validation_error", field, message)
        }
        ServiceError::Duplicate { field } => field_error(
            StatusCode::CONFLICT,
            "duplicate_field",
            field,
            format!("{field} is already taken"),
        ),
        ServiceError::InvalidResetToken => json_error(
            StatusCode::BAD_REQUEST,
            "invalid_or_expired_token",
            "token is invalid or expired",
        ),
        ServiceError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        ServiceError::Internal(cause) => {
            tracing::error!(error = ?cause, "request failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal server error",
            )
        }
    }
}

pub fn unauthorized() -> axum::response::Response {
    json_error(StatusCode::UNAUTHORIZED, "unauthorized", "unauthorized")
}

pub fn forbidden() -> axum::response::Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", "insufficient role")
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn field_error(
    status: StatusCode,
    code: &'static str,
    field: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "field": field,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (ServiceError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ServiceError::Forbidden, StatusCode::FORBIDDEN),
            (
                ServiceError::Validation {
                    field: "email",
                    message: "is required".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (ServiceError::Duplicate { field: "email" }, StatusCode::CONFLICT),
            (ServiceError::InvalidResetToken, StatusCode::BAD_REQUEST),
            (ServiceError::NotFound, StatusCode::NOT_FOUND),
            (
                ServiceError::internal(anyhow::anyhow!("db down")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(service_error_to_response(err).status(), status);
        }
    }
}
