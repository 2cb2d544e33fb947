use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::error::ApiError;
use crate::forms::{ApiPath, ApiQuery, FormOrJson};
use crate::loan::{
    BulkDeleteRequest, BulkDeleteResult, DisburseLoanRequest, InvoiceView, ListLoansQuery, Loan,
    LoanService, LoanView,
};
use crate::middleware::AdminUser;
use crate::models::{ApiResponse, PaginatedResponse};
use crate::payment::{Payment, PaymentService};

pub async fn disburse_loan(
    State(service): State<Arc<LoanService>>,
    FormOrJson(request): FormOrJson<DisburseLoanRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Loan>>), ApiError> {
    let loan = service.disburse_loan(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(loan, "Préstamo registrado exitosamente")),
    ))
}

pub async fn list_loans(
    State(service): State<Arc<LoanService>>,
    ApiQuery(query): ApiQuery<ListLoansQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<LoanView>>>, ApiError> {
    let page = service.list_loans(query).await?;
    Ok(Json(ApiResponse::ok(page)))
}

pub async fn get_loan(
    State(service): State<Arc<LoanService>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<LoanView>>, ApiError> {
    let loan = service.get_loan(id).await?;
    Ok(Json(ApiResponse::ok(loan)))
}

pub async fn get_loan_invoice(
    State(service): State<Arc<LoanService>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<InvoiceView>>, ApiError> {
    let invoice = service.invoice_for_loan(id).await?;
    Ok(Json(ApiResponse::ok(invoice)))
}

pub async fn get_invoice_by_number(
    State(service): State<Arc<LoanService>>,
    ApiPath(number): ApiPath<String>,
) -> Result<Json<ApiResponse<InvoiceView>>, ApiError> {
    let invoice = service.invoice_by_number(&number).await?;
    Ok(Json(ApiResponse::ok(invoice)))
}

pub async fn list_loan_payments(
    State(service): State<Arc<PaymentService>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Vec<Payment>>>, ApiError> {
    let payments = service.payments_for_loan(id).await?;
    Ok(Json(ApiResponse::ok(payments)))
}

pub async fn void_loan(
    State(service): State<Arc<LoanService>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Loan>>, ApiError> {
    let loan = service.void_loan(id).await?;
    Ok(Json(ApiResponse::with_message(loan, "Préstamo anulado")))
}

pub async fn toggle_loan_activity(
    State(service): State<Arc<LoanService>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Loan>>, ApiError> {
    let loan = service.toggle_activity(id).await?;
    let message = format!("Préstamo ahora {}", loan.status.as_str());
    Ok(Json(ApiResponse::with_message(loan, message)))
}

pub async fn bulk_delete_loans(
    AdminUser(admin): AdminUser,
    State(service): State<Arc<LoanService>>,
    FormOrJson(request): FormOrJson<BulkDeleteRequest>,
) -> Result<Json<ApiResponse<BulkDeleteResult>>, ApiError> {
    tracing::info!(admin = %admin.username, count = request.loan_ids.len(), "Bulk loan deletion requested");
    let result = service.bulk_delete(&request.loan_ids).await?;
    Ok(Json(ApiResponse::ok(result)))
}
