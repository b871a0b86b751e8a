//! HTTP application wiring (axum router + service wiring).
//!
//! - `services.rs`: builds `AppState` from configuration (store, mail, hasher)
//! - `routes/`: handlers, one file per area
//! - `dto.rs`: request/response bodies
//! - `errors.rs`: consistent error responses

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use sesame_auth::{BACKOFFICE, RoleGate};

use crate::{authz, middleware};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppState, build_state};

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(state: AppState) -> Router {
    let auth_state = middleware::AuthState::new(state.auth.token_verifier());

    // Any authenticated caller.
    let authenticated = routes::auth::authenticated_router().layer(
        axum::middleware::from_fn_with_state(auth_state.clone(), middleware::auth_middleware),
    );

    // Authenticated and holding `backoffice`. The role guard is the inner layer
    // so it sees the principal the auth layer attached.
    let backoffice = routes::auth::backoffice_router()
        .merge(routes::roles::router())
        .layer(axum::middleware::from_fn_with_state(
            RoleGate::any_of([BACKOFFICE]),
            authz::require_roles,
        ))
        .layer(axum::middleware::from_fn_with_state(
            auth_state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::auth::public_router())
        .merge(authenticated)
        .merge(backoffice)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(Extension(state))
                .layer(Extension(auth_state)),
        )
}
