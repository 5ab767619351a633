//! Error handling utilities for repositories

use presence_core::DomainError;
use sqlx::Error as SqlxError;

/// Convert SQLx error to DomainError
pub fn map_db_error(e: SqlxError) -> DomainError {
    DomainError::DatabaseError(e.to_string())
}

/// Reject a pipeline shape the collection cannot evaluate
pub fn unsupported_pipeline(detail: &str) -> DomainError {
    DomainError::validation(format!("unsupported aggregation pipeline: {detail}"))
}
