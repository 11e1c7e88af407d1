//! File metadata shared by tender and bid documents.
//!
//! Files themselves are uploaded elsewhere; the aggregates only keep the
//! storage URL and descriptive metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata for a file already placed in storage by the caller.
#[derive(Debug, Clone, Default)]
pub struct DocumentAttachment {
    pub name: String,
    pub file_url: String,
    pub description: String,
    pub document_type: String,
    pub file_type: String,
    pub file_size: i64,
}

/// Request DTO for attaching a document
#[derive(Debug, Clone, Deserialize)]
pub struct AttachDocumentRequest {
    pub name: String,
    pub file_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub file_size: i64,
}

impl From<AttachDocumentRequest> for DocumentAttachment {
    fn from(r: AttachDocumentRequest) -> Self {
        Self {
            name: r.name,
            file_url: r.file_url,
            description: r.description.unwrap_or_default(),
            document_type: r.document_type.unwrap_or_default(),
            file_type: r.file_type.unwrap_or_default(),
            file_size: r.file_size,
        }
    }
}

/// Response DTO for a tender or bid document
#[derive(Debug, Clone, Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub name: String,
    pub file_url: String,
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub document_type: String,
    pub file_type: String,
    pub file_size: i64,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}
