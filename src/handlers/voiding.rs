use axum::{extract::State, Json};
use std::sync::Arc;

use crate::error::ApiError;
use crate::forms::{ApiQuery, FormOrJson};
use crate::middleware::AuthenticatedUser;
use crate::models::ApiResponse;
use crate::voiding::{ArchiveQuery, VoidReceiptRequest, VoidService, VoidedReceipt};

pub async fn void_receipt(
    AuthenticatedUser(actor): AuthenticatedUser,
    State(service): State<Arc<VoidService>>,
    FormOrJson(request): FormOrJson<VoidReceiptRequest>,
) -> Result<Json<ApiResponse<VoidedReceipt>>, ApiError> {
    let archived = service.void_receipt(request, &actor).await?;
    let message = format!("Recibo {} anulado", archived.receipt_number);
    Ok(Json(ApiResponse::with_message(archived, message)))
}

pub async fn list_voided_receipts(
    State(service): State<Arc<VoidService>>,
    ApiQuery(query): ApiQuery<ArchiveQuery>,
) -> Result<Json<ApiResponse<Vec<VoidedReceipt>>>, ApiError> {
    let entries = service.list_archive(query).await?;
    Ok(Json(ApiResponse::ok(entries)))
}
