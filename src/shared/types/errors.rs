use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Already exists: {0}")]
    DuplicateKey(String),

    #[error("Invalid unit of work state: {0}")]
    InvalidState(String),

    #[error("Commit failed: {0}")]
    Commit(String),

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Out of stock for sku {0}")]
    OutOfStock(String),

    #[error("Invalid sku {0}")]
    InvalidSku(String),

    #[error("Validation: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn batch_not_found(reference: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "Batch",
            field: "reference",
            value: reference.into(),
        }
    }

    /// Whether this error is likely transient (e.g. DB connection lost, lock
    /// contention) and the operation may succeed if retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::Storage(_) | DomainError::Commit(_))
    }

    /// Errors caused by the request rather than by the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DomainError::NotFound { .. }
                | DomainError::DuplicateKey(_)
                | DomainError::InvariantViolation(_)
                | DomainError::OutOfStock(_)
                | DomainError::InvalidSku(_)
                | DomainError::Validation(_)
        )
    }
}

impl From<validator::ValidationErrors> for DomainError {
    fn from(errors: validator::ValidationErrors) -> Self {
        DomainError::Validation(errors.to_string())
    }
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_the_entity() {
        let err = DomainError::batch_not_found("batch1");
        assert_eq!(err.to_string(), "Not found: Batch with reference=batch1");
    }

    #[test]
    fn only_storage_failures_are_transient() {
        assert!(DomainError::Storage("locked".into()).is_transient());
        assert!(DomainError::Commit("disk I/O error".into()).is_transient());
        assert!(!DomainError::OutOfStock("SKU1".into()).is_transient());
        assert!(!DomainError::InvalidState("twice".into()).is_transient());
    }

    #[test]
    fn client_errors_exclude_storage_failures() {
        assert!(DomainError::InvalidSku("NOPE".into()).is_client_error());
        assert!(DomainError::batch_not_found("x").is_client_error());
        assert!(!DomainError::Commit("boom".into()).is_client_error());
        assert!(!DomainError::InvalidState("twice".into()).is_client_error());
    }
}
