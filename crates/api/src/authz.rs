//! Route-level role guard.
//!
//! Runs after [`crate::middleware::auth_middleware`], so a missing principal
//! means the layers were stacked in the wrong order and is treated as 401.

use axum::{extract::State, middleware::Next, response::Response};

use sesame_auth::RoleGate;

use crate::app::errors;
use crate::context::PrincipalContext;

pub async fn require_roles(
    State(gate): State<RoleGate>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(principal) = req.extensions().get::<PrincipalContext>() else {
        return errors::unauthorized();
    };

    if let Err(e) = gate.check(principal.roles()) {
        tracing::info!(identity_id = %principal.identity_id(), error = %e, "request forbidden");
        return errors::forbidden();
    }

    next.run(req).await
}
