use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::dispatcher::DispatchError;
use crate::persistence::StoreError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Transaction ID already exists")]
    DuplicateTransaction { transaction_id: String },
    #[error("Invalid or missing API key")]
    Authentication,
    #[error("Invalid request body: {0}")]
    InvalidRequest(String),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
    #[error("Failed to schedule statistics recompute: {0}")]
    Dispatch(#[from] DispatchError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(transaction_id) => {
                ServiceError::DuplicateTransaction { transaction_id }
            }
            other => ServiceError::StoreUnavailable(other),
        }
    }
}

impl From<actix_web::error::BlockingError> for ServiceError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::DuplicateTransaction { .. } => StatusCode::BAD_REQUEST,
            ServiceError::Authentication => StatusCode::FORBIDDEN,
            ServiceError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::StoreUnavailable(_)
            | ServiceError::Dispatch(_)
            | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Infrastructure details stay in the logs.
        let detail = match self {
            ServiceError::StoreUnavailable(_) | ServiceError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(ErrorBody { detail })
    }
}
