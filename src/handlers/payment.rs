use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::error::ApiError;
use crate::forms::{ApiPath, FormOrJson};
use crate::models::ApiResponse;
use crate::payment::{PaymentReceipt, PaymentService, ReceiptView, RegisterPaymentRequest};

pub async fn register_payment(
    State(service): State<Arc<PaymentService>>,
    FormOrJson(request): FormOrJson<RegisterPaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentReceipt>>), ApiError> {
    let receipt = service.register_payment(request).await?;
    let message = format!("Pago registrado con recibo {}", receipt.payment.receipt_number);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(receipt, message)),
    ))
}

pub async fn get_receipt(
    State(service): State<Arc<PaymentService>>,
    ApiPath(number): ApiPath<String>,
) -> Result<Json<ApiResponse<ReceiptView>>, ApiError> {
    let receipt = service.get_receipt(&number).await?;
    Ok(Json(ApiResponse::ok(receipt)))
}
