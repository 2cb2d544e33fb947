//! Payment ledger and receipt archive routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/api/payments", post(register_payment))
        .route("/api/receipts/void", post(void_receipt))
        .route("/api/receipts/:number", get(get_receipt))
        .route("/api/voided-receipts", get(list_voided_receipts))
}
