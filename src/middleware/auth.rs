//! Authentication extractors
//!
//! Verify the bearer token on the request and hand the caller to the handler as an
//! [`Actor`]. Rejections use the shared JSON error body.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use std::sync::Arc;

use crate::auth::{Actor, JwtError, TokenVerifier};
use crate::error::ApiError;

/// Caller authenticated by a valid bearer token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<TokenVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    ApiError::Unauthorized("Se requiere un token de acceso".to_string())
                })?;

        let verifier = Arc::<TokenVerifier>::from_ref(state);
        let actor = verifier.verify(bearer.token()).map_err(|e| {
            tracing::debug!(error = %e, "Bearer token rejected");
            match e {
                JwtError::TokenExpired => {
                    ApiError::Unauthorized("El token de acceso ha expirado".to_string())
                }
                _ => ApiError::Unauthorized("Token de acceso inválido".to_string()),
            }
        })?;

        Ok(AuthenticatedUser(actor))
    }
}

/// Caller holding the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    Arc<TokenVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(actor) = AuthenticatedUser::from_request_parts(parts, state).await?;

        if !actor.is_admin() {
            tracing::warn!(user = %actor.username, "Admin route refused");
            return Err(ApiError::Forbidden(
                "Se requieren permisos de administrador".to_string(),
            ));
        }

        Ok(AdminUser(actor))
    }
}
