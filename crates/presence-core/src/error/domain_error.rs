//! Domain errors - error types for the domain layer

use thiserror::Error;

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Security
    // =========================================================================
    /// Tenant context absent, or an operation tried to cross a tenant boundary
    #[error("Security violation: {0}")]
    SecurityViolation(String),

    // =========================================================================
    // Validation
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    // =========================================================================
    // Not Found
    // =========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    // =========================================================================
    // Infrastructure Errors (wrapped)
    // =========================================================================
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    /// Security violation for an operation attempted without tenant context
    pub fn missing_tenant(operation: &str) -> Self {
        Self::SecurityViolation(format!("{operation} attempted without tenant context"))
    }

    /// Security violation for an attempt to rewrite an entity's tenant
    pub fn tenant_mutation(operation: &str) -> Self {
        Self::SecurityViolation(format!("{operation} attempted to change tenant_id"))
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Get an error code string for acknowledgements
    pub fn code(&self) -> &'static str {
        match self {
            Self::SecurityViolation(_) => "SECURITY_VIOLATION",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if this is a tenant-isolation failure
    pub fn is_security(&self) -> bool {
        matches!(self, Self::SecurityViolation(_))
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationError(_))
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a backing-store failure that callers absorb
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::DatabaseError(_))
    }

    /// Whether the error is reported back to the caller rather than absorbed
    pub fn is_surfaced(&self) -> bool {
        self.is_security() || self.is_validation()
    }
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
