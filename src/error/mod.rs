//! Centralized API error handling
//!
//! One error type for every handler and service, mapped onto HTTP status codes and a
//! JSON error body. Server-side failures are logged in full and reported to the caller
//! with a generic message only.

use std::collections::BTreeMap;
use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

const GENERIC_SERVER_MESSAGE: &str = "Error interno del servidor";

/// Per-field validation messages, keyed by request field name
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Fold derive-based validation results into this collection
    pub fn extend_from(&mut self, errors: validator::ValidationErrors) {
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| error.code.to_string());
                self.add(field, message);
            }
        }
    }

    /// `Ok(())` when nothing was collected, otherwise a validation error
    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.fields().collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut collected = FieldErrors::new();
        collected.extend_from(errors);
        collected
    }
}

/// API error type with HTTP status code mapping
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rejected: {0}")]
    BusinessRule(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Sequence exhausted: {0}")]
    SequenceExhausted(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// JSON error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}

/// Error details in the response
#[derive(Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::BusinessRule(_) => "REJECTED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::UniqueViolation(_) => "DUPLICATE_KEY",
            ApiError::SequenceExhausted(_) => "SEQUENCE_EXHAUSTED",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) | ApiError::BusinessRule(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::UniqueViolation(_)
            | ApiError::SequenceExhausted(_)
            | ApiError::DatabaseError(_)
            | ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Message safe to show to the caller
    pub fn client_message(&self) -> String {
        match self {
            ApiError::Validation(_) => "Error de validación en los datos".to_string(),
            ApiError::BadRequest(msg)
            | ApiError::BusinessRule(msg)
            | ApiError::NotFound(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg) => msg.clone(),
            ApiError::MethodNotAllowed => "Método no permitido".to_string(),
            ApiError::UniqueViolation(_)
            | ApiError::SequenceExhausted(_)
            | ApiError::DatabaseError(_)
            | ApiError::InternalError(_) => GENERIC_SERVER_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        if self.is_server_error() {
            tracing::error!(error = %self, code = %error_code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = %error_code, "Client error occurred");
        }

        let message = self.client_message();
        let errors = match self {
            ApiError::Validation(fields) => Some(fields),
            _ => None,
        };

        let body = ErrorResponse {
            success: false,
            error: ErrorDetails {
                code: error_code.to_string(),
                message,
            },
            errors,
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Recurso no encontrado".to_string()),
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                ApiError::UniqueViolation(db_err.constraint().unwrap_or("unknown").to_string())
            }
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                ApiError::BusinessRule(
                    "El registro está referenciado por otros registros".to_string(),
                )
            }
            _ => ApiError::DatabaseError(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::Validation(err.into())
    }
}

/// Result type alias using ApiError
pub type ApiResult<T> = Result<T, ApiError>;
