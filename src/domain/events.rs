use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

// ============================================================================
// Domain Events
// ============================================================================
//
// Recorded by aggregates during a transition and drained by the service
// layer once the surrounding transaction has committed.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    TenderPublished {
        tender_id: Uuid,
        title: String,
        reference_number: String,
        closing_date: DateTime<Utc>,
    },
    TenderAwarded {
        tender_id: Uuid,
        title: String,
        winning_bid_id: Uuid,
    },
    BidSubmitted {
        bid_id: Uuid,
        tender_id: Uuid,
        bidder_id: Uuid,
        submission_date: DateTime<Utc>,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TenderPublished { .. } => "TenderPublished",
            Self::TenderAwarded { .. } => "TenderAwarded",
            Self::BidSubmitted { .. } => "BidSubmitted",
        }
    }

    pub fn aggregate_id(&self) -> Uuid {
        match self {
            Self::TenderPublished { tender_id, .. } | Self::TenderAwarded { tender_id, .. } => {
                *tender_id
            }
            Self::BidSubmitted { bid_id, .. } => *bid_id,
        }
    }
}
