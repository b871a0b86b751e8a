//! HTTP API: routing, bearer authentication and response mapping.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
