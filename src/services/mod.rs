//! Application services.
//!
//! Thin handlers that validate input, load aggregates through a
//! [`UnitOfWork`](crate::persistence::UnitOfWork), call one transition and
//! persist the result in a single transaction.

use thiserror::Error;

use crate::domain::{DomainError, ErrorKind};
use crate::persistence::StoreError;

pub mod accounts;
pub mod bids;
pub mod events;
pub mod tenders;

pub use accounts::{AccountService, Principal, TokenPolicy};
pub use bids::BidService;
pub use events::{EventSink, LogEventSink};
pub use tenders::TenderService;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    DuplicateKey(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(what) => Self::DuplicateKey(format!("Duplicate {what}")),
            StoreError::NotFound { entity, id } => Self::NotFound {
                entity,
                id: id.to_string(),
            },
            other => Self::Store(other),
        }
    }
}

impl ServiceError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Caller-facing kind, `None` for infrastructure failures.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Validation(_) => Some(ErrorKind::Validation),
            Self::NotFound { .. } => Some(ErrorKind::NotFound),
            Self::DuplicateKey(_) => Some(ErrorKind::DuplicateKey),
            Self::Domain(e) => Some(e.kind()),
            Self::Unauthorized(_) | Self::Forbidden(_) | Self::Store(_) => None,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Rejects malformed input before any aggregate is touched.
pub(crate) fn require_field(field: &str, value: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::Validation(format!("{field} is required")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_store_errors_map_to_kinds() {
        let dup: ServiceError = StoreError::Duplicate("tender reference number 'T-1'".into()).into();
        assert_eq!(dup.kind(), Some(ErrorKind::DuplicateKey));

        let missing: ServiceError = StoreError::NotFound {
            entity: "bid",
            id: Uuid::nil(),
        }
        .into();
        assert_eq!(missing.kind(), Some(ErrorKind::NotFound));

        let broken: ServiceError = StoreError::Transaction("lost connection".into()).into();
        assert_eq!(broken.kind(), None);
    }

    #[test]
    fn test_require_field() {
        assert!(require_field("title", "Roads").is_ok());
        assert!(matches!(
            require_field("title", "  "),
            Err(ServiceError::Validation(_))
        ));
    }
}
