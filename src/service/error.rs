use thiserror::Error;
use axum::http::StatusCode;

use crate::{
    error::HttpError,
    extraction::types::ExtractionError,
    models::listingmodel::ListingStatus,
};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Listing {0} not found")]
    ListingNotFound(i64),

    #[error("Listing {id} cannot move from {from:?} to {to:?}")]
    InvalidStatusTransition {
        id: i64,
        from: ListingStatus,
        to: ListingStatus,
    },

    #[error("Database error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Upload error: {0}")]
    Upload(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NotificationError {
    #[error("Email transport is not configured")]
    NotConfigured,

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Email transport error: {0}")]
    Transport(String),
}

impl NotificationError {
    /// Only transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, NotificationError::Transport(_))
    }
}

impl From<NotificationError> for ServiceError {
    fn from(err: NotificationError) -> Self {
        ServiceError::Notification(err.to_string())
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        let status = error.status_code();
        match error {
            ServiceError::Storage(ref e) => {
                tracing::error!("Storage failure: {:?}", e);
                HttpError::new("Failed to access listing storage", status)
            }
            _ => HttpError::new(error.to_string(), status),
        }
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Upload(err.to_string())
    }
}

impl From<ExtractionError> for HttpError {
    fn from(error: ExtractionError) -> Self {
        let status = match error {
            ExtractionError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            ExtractionError::Fetch(_) => StatusCode::BAD_GATEWAY,
            ExtractionError::Blocked | ExtractionError::NoListingData => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
        };
        HttpError::new(error.to_string(), status)
    }
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::ListingNotFound(_) => StatusCode::NOT_FOUND,

            ServiceError::Validation(_)
            | ServiceError::InvalidStatusTransition { .. } => StatusCode::BAD_REQUEST,

            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,

            ServiceError::Notification(_) => StatusCode::INTERNAL_SERVER_ERROR,

            ServiceError::Upload(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
