//! Handler error types

use presence_core::StatusParseError;
use presence_service::ServiceError;
use thiserror::Error;
use validator::ValidationErrors;

/// Handler error type; reported in the failed acknowledgement
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Payload did not decode
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Payload decoded but failed validation
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Invalid status: {0}")]
    InvalidStatus(#[from] StatusParseError),

    /// Event sent before `authenticate_presence`
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Already authenticated")]
    AlreadyAuthenticated,

    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Error code for the acknowledgement
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
            Self::Validation(_) | Self::InvalidStatus(_) => "VALIDATION_ERROR",
            Self::NotAuthenticated => "NOT_AUTHENTICATED",
            Self::AlreadyAuthenticated => "ALREADY_AUTHENTICATED",
            Self::UnknownEvent(_) => "UNKNOWN_EVENT",
            Self::Service(e) => e.error_code(),
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to send to the client
    pub fn client_message(&self) -> String {
        match self {
            Self::Service(e) if e.is_validation() => e.to_string(),
            Self::Service(ServiceError::ShuttingDown) => ServiceError::ShuttingDown.to_string(),
            Self::Service(e) if e.is_security() => "Tenant context required".to_string(),
            Self::Service(_) | Self::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_security(&self) -> bool {
        matches!(self, Self::Service(e) if e.is_security())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidPayload(err.to_string())
    }
}

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;
