use axum::Json;

use crate::amortization::{build_schedule, AmortizationRequest, AmortizationSchedule};
use crate::error::ApiError;
use crate::forms::FormOrJson;
use crate::models::ApiResponse;

pub async fn preview_amortization(
    FormOrJson(request): FormOrJson<AmortizationRequest>,
) -> Result<Json<ApiResponse<AmortizationSchedule>>, ApiError> {
    let input = request.parse().map_err(ApiError::Validation)?;
    Ok(Json(ApiResponse::ok(build_schedule(&input))))
}
