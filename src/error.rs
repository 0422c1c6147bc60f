use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::domain::InvalidTransition;
use crate::ports::RepositoryError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Product not found or inactive: {0}")]
    ProductNotFound(String),

    #[error("Currency mismatch: requested {requested}, product uses {expected}")]
    CurrencyMismatch { requested: String, expected: String },

    #[error("{0}")]
    AmountOutOfRange(String),

    #[error("Vendor timeout - pending: {0}")]
    VendorTimeout(String),

    #[error("No adapter found for vendor: {0}")]
    NoAdapterConfigured(String),

    #[error("Vendor error: {0}")]
    Vendor(String),

    #[error("Transaction not activated: {0}")]
    NotActivated(String),

    #[error("Invoice or product mismatch for transaction: {0}")]
    InvoiceProductMismatch(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable domain code reported to clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ProductNotFound(_) => "SA01",
            AppError::CurrencyMismatch { .. } => "SA02",
            AppError::AmountOutOfRange(_) => "SA03",
            AppError::VendorTimeout(_) => "SA04",
            AppError::NoAdapterConfigured(_) => "VND01",
            AppError::Vendor(_) => "VND02",
            AppError::NotActivated(_) => "VD01",
            AppError::InvoiceProductMismatch(_) => "VD03",
            AppError::TransactionNotFound(_) => "TXN01",
            AppError::Validation(_) => "VAL01",
            AppError::MalformedRequest(_) => "VAL02",
            AppError::Repository(_) | AppError::Internal(_) => "SYS01",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ProductNotFound(_)
            | AppError::CurrencyMismatch { .. }
            | AppError::AmountOutOfRange(_)
            | AppError::InvoiceProductMismatch(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::VendorTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::NotActivated(_)
            | AppError::Validation(_)
            | AppError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            AppError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
            AppError::NoAdapterConfigured(_)
            | AppError::Vendor(_)
            | AppError::Repository(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the point of sale.
    fn client_message(&self) -> String {
        match self {
            AppError::Repository(_) | AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Attaches the request path so the error can be rendered as an HTTP response.
    pub fn at(self, path: impl Into<String>) -> ApiError {
        ApiError {
            error: self,
            path: path.into(),
        }
    }
}

impl From<InvalidTransition> for AppError {
    fn from(err: InvalidTransition) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Error payload returned by every endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error_code: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub path: String,
}

/// An [`AppError`] bound to the request path it occurred on.
#[derive(Debug)]
pub struct ApiError {
    pub error: AppError,
    pub path: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error.code(), path = %self.path, "{}", self.error);
        } else {
            tracing::warn!(code = self.error.code(), path = %self.path, "{}", self.error);
        }

        let body = Json(ErrorResponse {
            error_code: self.error.code().to_string(),
            message: self.error.client_message(),
            timestamp: Utc::now(),
            path: self.path,
        });

        (status, body).into_response()
    }
}
