//! Route definitions for the back office API

mod client;
mod loan;
mod payment;

use axum::{middleware, routing::get, Router};

use crate::handlers::{health_check, not_found};
use crate::middleware::{json_method_not_allowed, request_tracing, security_headers};
use crate::state::AppState;

pub use client::client_routes;
pub use loan::loan_routes;
pub use payment::payment_routes;

/// Full application router with state applied. CORS is layered on by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(client_routes())
        .merge(loan_routes())
        .merge(payment_routes())
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn(json_method_not_allowed))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_tracing))
}
