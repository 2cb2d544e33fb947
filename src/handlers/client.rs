use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::client::{
    Client, ClientSearchRequest, ClientSearchResult, ClientService, RegisterClientRequest,
    UpdateContactRequest,
};
use crate::error::ApiError;
use crate::forms::{ApiPath, FormOrJson};
use crate::loan::{LoanService, LoanView};
use crate::middleware::AdminUser;
use crate::models::ApiResponse;

pub async fn register_client(
    State(service): State<Arc<ClientService>>,
    FormOrJson(request): FormOrJson<RegisterClientRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Client>>), ApiError> {
    let client = service.register_client(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(client, "Cliente registrado exitosamente")),
    ))
}

pub async fn search_clients(
    State(service): State<Arc<ClientService>>,
    FormOrJson(request): FormOrJson<ClientSearchRequest>,
) -> Result<Json<ApiResponse<Vec<ClientSearchResult>>>, ApiError> {
    let results = service.search_clients(request).await?;
    Ok(Json(ApiResponse::ok(results)))
}

pub async fn get_client(
    State(service): State<Arc<ClientService>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Client>>, ApiError> {
    let client = service.get_client(id).await?;
    Ok(Json(ApiResponse::ok(client)))
}

pub async fn update_client_contact(
    State(service): State<Arc<ClientService>>,
    ApiPath(id): ApiPath<i64>,
    FormOrJson(request): FormOrJson<UpdateContactRequest>,
) -> Result<Json<ApiResponse<Client>>, ApiError> {
    let client = service.update_contact(id, request).await?;
    Ok(Json(ApiResponse::with_message(client, "Datos de contacto actualizados")))
}

pub async fn delete_client(
    AdminUser(admin): AdminUser,
    State(service): State<Arc<ClientService>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    tracing::info!(client_id = id, admin = %admin.username, "Client deletion requested");
    service.delete_client(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_client_loans(
    State(clients): State<Arc<ClientService>>,
    State(loans): State<Arc<LoanService>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Vec<LoanView>>>, ApiError> {
    clients.get_client(id).await?;
    let loans = loans.loans_for_client(id).await?;
    Ok(Json(ApiResponse::ok(loans)))
}
