use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::audit::{AuditInfo, AuditStamp};
use crate::domain::documents::DocumentAttachment;
use crate::domain::errors::{require_text, DomainError, DomainResult};

// ============================================================================
// Tender child entities
// ============================================================================
//
// Plain records owned by a Tender. They are only reachable through the
// aggregate's read-only slices, so the aggregate stays the single writer.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TenderDocument {
    pub id: Uuid,
    pub name: String,
    pub file_url: String,
    pub description: String,
    pub file_type: String,
    pub file_size: i64,
    pub audit: AuditInfo,
}

impl TenderDocument {
    pub(crate) fn new(attachment: DocumentAttachment, stamp: &AuditStamp) -> DomainResult<Self> {
        let name = require_text("document name", &attachment.name)?;
        let file_url = require_text("file url", &attachment.file_url)?;
        if attachment.file_size < 0 {
            return Err(DomainError::invalid_argument(
                "file size",
                "cannot be negative",
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name,
            file_url,
            description: attachment.description,
            file_type: attachment.file_type,
            file_size: attachment.file_size,
            audit: AuditInfo::created(stamp),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EligibilityCriteria {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub audit: AuditInfo,
}

impl EligibilityCriteria {
    pub(crate) fn new(name: &str, description: &str, stamp: &AuditStamp) -> DomainResult<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            name: require_text("criteria name", name)?,
            description: description.trim().to_string(),
            audit: AuditInfo::created(stamp),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deliverable {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub audit: AuditInfo,
}

impl Deliverable {
    pub(crate) fn new(name: &str, description: &str, stamp: &AuditStamp) -> DomainResult<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            name: require_text("deliverable name", name)?,
            description: description.trim().to_string(),
            audit: AuditInfo::created(stamp),
        })
    }
}

/// Planned milestone on the tender timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TenderActivity {
    pub id: Uuid,
    pub activity_name: String,
    pub expected_date: DateTime<Utc>,
    pub audit: AuditInfo,
}

impl TenderActivity {
    pub(crate) fn new(
        activity_name: &str,
        expected_date: DateTime<Utc>,
        stamp: &AuditStamp,
    ) -> DomainResult<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            activity_name: require_text("activity name", activity_name)?,
            expected_date,
            audit: AuditInfo::created(stamp),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentTerm {
    pub id: Uuid,
    pub description: String,
    pub percentage: Decimal,
    pub audit: AuditInfo,
}

impl PaymentTerm {
    pub(crate) fn new(
        description: &str,
        percentage: Decimal,
        stamp: &AuditStamp,
    ) -> DomainResult<Self> {
        if percentage <= Decimal::ZERO || percentage > Decimal::ONE_HUNDRED {
            return Err(DomainError::invalid_argument(
                "percentage",
                format!("must be in (0, 100], got {percentage}"),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            description: description.trim().to_string(),
            percentage,
            audit: AuditInfo::created(stamp),
        })
    }
}
