use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use scavcore::{ProviderError, RelayError, StoreError, ValidationError};
use serde::Serialize;
use thiserror::Error;

/// Body returned for server-side failures; details stay in the logs
pub const GENERIC_ERROR: &str = "there was an error processing your request";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("missing api key")]
    MissingApiKey,

    #[error("incorrect api key")]
    IncorrectApiKey,

    #[error("unauthorized")]
    Unauthorized,

    #[error("workflow {0} already exists")]
    Conflict(String),

    #[error("there was an error processing your request")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::MissingApiKey | ApiError::IncorrectApiKey | ApiError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}

impl From<ProviderError> for ApiError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::AlreadyExists(name)
            | ProviderError::Store(StoreError::Duplicate(name))
            | ProviderError::Persistence {
                source: StoreError::Duplicate(name),
                ..
            } => ApiError::Conflict(name),
            other => {
                tracing::error!(error = %other, "Provider request failed");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        tracing::error!(error = %e, "Store request failed");
        ApiError::Internal(e.to_string())
    }
}

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        tracing::error!(error = %e, "Relay request failed");
        ApiError::Internal(e.to_string())
    }
}
