use serde::Serialize;
use uuid::Uuid;

use crate::domain::audit::{AuditInfo, AuditStamp};
use crate::domain::documents::DocumentAttachment;
use crate::domain::errors::{require_text, DomainError, DomainResult};
use crate::domain::value_objects::Money;

/// Priced line of a bid. `total_price` is always `unit_price × quantity`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BidItem {
    pub id: Uuid,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Money,
    pub total_price: Money,
    pub audit: AuditInfo,
}

impl BidItem {
    pub(crate) fn new(
        description: &str,
        quantity: i32,
        unit_price: Money,
        stamp: &AuditStamp,
    ) -> DomainResult<Self> {
        let description = require_text("item description", description)?;
        if quantity <= 0 {
            return Err(DomainError::invalid_argument(
                "quantity",
                format!("must be greater than zero, got {quantity}"),
            ));
        }
        let total_price = unit_price.multiply(quantity as u32)?;

        Ok(Self {
            id: Uuid::new_v4(),
            description,
            quantity,
            unit_price,
            total_price,
            audit: AuditInfo::created(stamp),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BidDocument {
    pub id: Uuid,
    pub name: String,
    pub file_url: String,
    pub document_type: String,
    pub file_type: String,
    pub file_size: i64,
    pub audit: AuditInfo,
}

impl BidDocument {
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
            document_type: attachment.document_type,
            file_type: attachment.file_type,
            file_size: attachment.file_size,
            audit: AuditInfo::created(stamp),
        })
    }
}
