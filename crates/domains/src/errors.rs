//! # DomainError
//!
//! Typed failures returned by every port and use case. The surrounding
//! service layer decides how each kind is presented; nothing here knows about
//! status codes or wire formats.

use thiserror::Error;

use crate::models::ParentRef;

/// The primary error type for all domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Resource not found (e.g. post, user, forum)
    #[error("{0} not found with key {1}")]
    NotFound(String, String),

    /// The thread named by id or slug does not exist
    #[error("thread not found: {0}")]
    ThreadNotFound(String),

    /// A batch entry names a parent that is missing, lives in another
    /// thread, or is a later entry of the same batch
    #[error("parent {parent} of batch entry #{position} not found in thread")]
    ParentNotFound { position: usize, parent: ParentRef },

    /// The referenced user does not exist
    #[error("author not found: {0}")]
    AuthorNotFound(String),

    #[error("unsupported sort mode: {0}")]
    UnsupportedSortMode(String),

    /// Unique-key violation surfaced by the store (duplicate slug, vote key...)
    #[error("conflict: {0}")]
    ConstraintConflict(String),

    #[error("validation error: {0}")]
    Validation(String),

    /// Infrastructure failure (connection loss, serialization failure...)
    #[error("storage error: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn not_found(entity: &str, key: impl ToString) -> Self {
        DomainError::NotFound(entity.to_string(), key.to_string())
    }

    /// Whether the failure means "the thing asked for is absent", as opposed
    /// to a conflict or an infrastructure problem.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DomainError::NotFound(..)
                | DomainError::ThreadNotFound(_)
                | DomainError::ParentNotFound { .. }
                | DomainError::AuthorNotFound(_)
        )
    }
}

/// A specialized Result type for domain logic.
pub type DomainResult<T> = std::result::Result<T, DomainError>;
