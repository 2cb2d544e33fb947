//! Client registry routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn client_routes() -> Router<AppState> {
    Router::new()
        .route("/api/clients", post(register_client))
        .route("/api/clients/search", post(search_clients))
        .route(
            "/api/clients/:id",
            get(get_client)
                .patch(update_client_contact)
                .delete(delete_client),
        )
        .route("/api/clients/:id/loans", get(list_client_loans))
}
