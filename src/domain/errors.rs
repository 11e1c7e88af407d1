//! Business rule violations raised by value objects and aggregates.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

/// Caller-facing classification of a failure.
///
/// Every error raised anywhere in the domain or service layer maps onto one
/// of these kinds so the transport layer can pick a status without knowing
/// the concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    InvalidOperation,
    InvalidArgument,
    OutOfRange,
    DuplicateKey,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("Money amount cannot be negative: {0}")]
    InvalidAmount(Decimal),

    #[error("Money {operation} overflowed")]
    AmountOverflow { operation: &'static str },

    #[error("Invalid currency code: '{0}'")]
    InvalidCurrency(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Closing date {closing} must be after issue date {issue}")]
    InvalidTenderDate {
        issue: DateTime<Utc>,
        closing: DateTime<Utc>,
    },

    #[error("Invalid {field}: {reason}")]
    InvalidArgument { field: &'static str, reason: String },

    #[error("{0}")]
    InvalidTenderOperation(String),

    #[error("{0}")]
    InvalidOperation(String),

    #[error("Cannot combine money in {expected} with money in {found}")]
    CurrencyMismatch { expected: String, found: String },

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: Decimal,
        min: Decimal,
        max: Decimal,
    },
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAmount(_)
            | Self::AmountOverflow { .. }
            | Self::InvalidCurrency(_)
            | Self::InvalidEmail(_)
            | Self::InvalidTenderDate { .. }
            | Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::InvalidTenderOperation(_)
            | Self::InvalidOperation(_)
            | Self::CurrencyMismatch { .. } => ErrorKind::InvalidOperation,
            Self::OutOfRange { .. } => ErrorKind::OutOfRange,
        }
    }

    pub(crate) fn invalid_argument(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn tender_operation(message: impl Into<String>) -> Self {
        Self::InvalidTenderOperation(message.into())
    }

    pub(crate) fn operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

/// Rejects blank strings, returning the trimmed value.
pub(crate) fn require_text(field: &'static str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::invalid_argument(field, "cannot be empty"));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_group_variants() {
        assert_eq!(
            DomainError::InvalidAmount(Decimal::NEGATIVE_ONE).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            DomainError::tender_operation("nope").kind(),
            ErrorKind::InvalidOperation
        );
        assert_eq!(
            DomainError::CurrencyMismatch {
                expected: "USD".into(),
                found: "EUR".into()
            }
            .kind(),
            ErrorKind::InvalidOperation
        );
    }

    #[test]
    fn test_require_text_trims() {
        assert_eq!(require_text("title", "  Roads ").unwrap(), "Roads");
        assert!(matches!(
            require_text("title", "   "),
            Err(DomainError::InvalidArgument { field: "title", .. })
        ));
    }
}
