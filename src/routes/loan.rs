//! Loan ledger routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn loan_routes() -> Router<AppState> {
    Router::new()
        .route("/api/loans", post(disburse_loan).get(list_loans))
        .route("/api/loans/:id", get(get_loan))
        .route("/api/loans/:id/invoice", get(get_loan_invoice))
        .route("/api/loans/:id/payments", get(list_loan_payments))
        .route("/api/loans/:id/void", post(void_loan))
        .route("/api/loans/:id/toggle", post(toggle_loan_activity))
        .route("/api/invoices/:number", get(get_invoice_by_number))
        .route("/api/admin/loans/bulk-delete", post(bulk_delete_loans))
        .route("/api/amortization", post(preview_amortization))
}
