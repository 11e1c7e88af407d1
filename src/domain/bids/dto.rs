use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregate::{Bid, BidStatus};
use super::entities::{BidDocument, BidItem};
use crate::domain::documents::DocumentResponse;
use crate::domain::dto::MoneyDto;

#[derive(Debug, Clone, Deserialize)]
pub struct BidItemRequest {
    pub description: String,
    pub quantity: i32,
    pub unit_price: MoneyDto,
}

/// Request DTO for creating a bid
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBidRequest {
    pub tender_id: Uuid,
    pub bid_amount: MoneyDto,
    #[serde(default)]
    pub technical_proposal_summary: String,
    #[serde(default)]
    pub bid_items: Vec<BidItemRequest>,
}

/// Request DTO for editing a draft bid. Items are appended.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBidRequest {
    #[serde(default)]
    pub technical_proposal_summary: Option<String>,
    #[serde(default)]
    pub bid_items: Vec<BidItemRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateBidRequest {
    pub score: Decimal,
    #[serde(default)]
    pub comments: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RejectBidRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BidItemResponse {
    pub id: Uuid,
    pub description: String,
    pub quantity: i32,
    pub unit_price: MoneyDto,
    pub total_price: MoneyDto,
}

impl From<&BidItem> for BidItemResponse {
    fn from(i: &BidItem) -> Self {
        Self {
            id: i.id,
            description: i.description.clone(),
            quantity: i.quantity,
            unit_price: MoneyDto::from(&i.unit_price),
            total_price: MoneyDto::from(&i.total_price),
        }
    }
}

impl From<&BidDocument> for DocumentResponse {
    fn from(d: &BidDocument) -> Self {
        Self {
            id: d.id,
            name: d.name.clone(),
            file_url: d.file_url.clone(),
            description: String::new(),
            document_type: d.document_type.clone(),
            file_type: d.file_type.clone(),
            file_size: d.file_size,
            created_at: d.audit.created_at(),
            created_by: d.audit.created_by().to_string(),
        }
    }
}

/// Response DTO for bid
#[derive(Debug, Clone, Serialize)]
pub struct BidResponse {
    pub id: Uuid,
    pub tender_id: Uuid,
    pub bidder_id: Uuid,
    pub status: BidStatus,
    pub bid_amount: MoneyDto,
    pub submission_date: Option<DateTime<Utc>>,
    pub technical_proposal_summary: String,
    pub score: Option<Decimal>,
    pub evaluation_comments: Option<String>,
    pub bid_items: Vec<BidItemResponse>,
    pub documents: Vec<DocumentResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&Bid> for BidResponse {
    fn from(b: &Bid) -> Self {
        Self {
            id: b.id(),
            tender_id: b.tender_id(),
            bidder_id: b.bidder_id(),
            status: b.status(),
            bid_amount: MoneyDto::from(b.bid_amount()),
            submission_date: b.submission_date(),
            technical_proposal_summary: b.technical_proposal_summary().to_string(),
            score: b.score(),
            evaluation_comments: b.evaluation_comments().map(str::to_string),
            bid_items: b.items().iter().map(Into::into).collect(),
            documents: b.documents().iter().map(Into::into).collect(),
            created_at: b.audit().created_at(),
            updated_at: b.audit().updated_at(),
        }
    }
}

impl From<Bid> for BidResponse {
    fn from(b: Bid) -> Self {
        Self::from(&b)
    }
}
