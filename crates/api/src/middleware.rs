use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use sesame_auth::{SessionClaims, TokenVerifier};

use crate::app::errors;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<dyn TokenVerifier>,
}

impl AuthState {
    pub fn new(tokens: Arc<dyn TokenVerifier>) -> Self {
        Self { tokens }
    }

    /// Claims from a well-formed, valid bearer header, if any.
    pub fn claims_from_headers(&self, headers: &HeaderMap) -> Option<SessionClaims> {
        let token = extract_bearer(headers).ok()?;
        self.tokens.verify(token, Utc::now()).ok()
    }
}

/// Reject requests without a valid bearer token; otherwise attach a
/// [`PrincipalContext`].
///
/// Missing header, bad scheme, bad signature and expiry all produce the same
/// 401 body.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let token = match extract_bearer(req.headers()) {
        Ok(token) => token,
        Err(_) => return errors::unauthorized(),
    };

    let claims = match state.tokens.verify(token, Utc::now()) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!(reason = %e, "bearer token rejected");
            return errors::unauthorized();
        }
    };

    req.extensions_mut().insert(PrincipalContext::new(claims));
    next.run(req).await
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(value).unwrap(),
        );
        map
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(extract_bearer(&headers("Bearer abc.def.ghi")), Ok("abc.def.ghi"));
    }

    #[test]
    fn other_schemes_are_rejected() {
        assert!(extract_bearer(&headers("Basic dXNlcjpwYXNz")).is_err());
        assert!(extract_bearer(&headers("Bearer    ")).is_err());
        assert!(extract_bearer(&HeaderMap::new()).is_err());
    }
}
